//! DNS message parsing and construction.
//!
//! Only the narrow profile this server answers is understood: a standard
//! query carrying exactly one uncompressed A/IN question. Replies echo the
//! client's question section byte for byte instead of re-encoding it.

use std::net::Ipv4Addr;

use crate::error::DnsError;

pub const HEADER_LEN: usize = 12;

/// TTL, in seconds, attached to every answer record.
pub const ANSWER_TTL: u32 = 60;

const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;

const FLAG_QR: u8 = 0x80;
const FLAG_TC: u8 = 0x02;

/// A validated query question.
///
/// Owns a copy of the question section (name + QTYPE + QCLASS) as it
/// appeared on the wire; the encoded name is the first `name_len` bytes of it.
/// Nothing borrows from the receive buffer, so the server is free to reuse
/// it as soon as parsing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: u16,
    name: String,
    section: Vec<u8>,
    name_len: usize,
}

impl Question {
    /// Parse a single-question A/IN query from a raw UDP payload.
    ///
    /// Checks run in wire order and the first failure wins, so a buffer that
    /// is cut short always reports `MalformedBuffer` before any check on the
    /// bytes it is missing.
    pub fn parse(data: &[u8]) -> Result<Self, DnsError> {
        if data.len() < HEADER_LEN {
            return Err(DnsError::MalformedBuffer);
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let flags = data[2];

        if flags & FLAG_QR != 0 {
            return Err(DnsError::NotAQuestion);
        }
        if (flags >> 3) & 0x0F != 0 {
            return Err(DnsError::NotAStandardQuery);
        }
        if flags & FLAG_TC != 0 {
            return Err(DnsError::TruncationNotSupported);
        }

        match u16::from_be_bytes([data[4], data[5]]) {
            0 => return Err(DnsError::NoQuestions),
            1 => {}
            _ => return Err(DnsError::MultipleQuestions),
        }

        // Labels are read as plain length-prefixed strings; a compression
        // pointer byte is just an oversized length and runs off the end.
        let mut pos = HEADER_LEN;
        let mut name = String::new();
        let mut labels = 0usize;
        loop {
            let label_len = *data.get(pos).ok_or(DnsError::MalformedBuffer)? as usize;
            pos += 1;
            if label_len == 0 {
                break;
            }
            let label = data
                .get(pos..pos + label_len)
                .ok_or(DnsError::MalformedBuffer)?;
            if labels > 0 {
                name.push('.');
            }
            name.push_str(&String::from_utf8_lossy(label));
            labels += 1;
            pos += label_len;
        }
        let name_end = pos;

        let tail = data
            .get(name_end..name_end + 4)
            .ok_or(DnsError::MalformedBuffer)?;
        let qtype = u16::from_be_bytes([tail[0], tail[1]]);
        let qclass = u16::from_be_bytes([tail[2], tail[3]]);

        if qclass != CLASS_IN {
            return Err(DnsError::QClassNotInet);
        }
        if qtype != TYPE_A {
            return Err(DnsError::QTypeNotAddress);
        }

        Ok(Self {
            id,
            name,
            section: data[HEADER_LEN..name_end + 4].to_vec(),
            name_len: name_end - HEADER_LEN,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Dot-joined query name, case preserved.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The question section exactly as received: name, QTYPE and QCLASS.
    pub fn raw_question_section(&self) -> &[u8] {
        &self.section
    }

    /// The encoded name only, including its terminating zero label.
    pub fn raw_name_bytes(&self) -> &[u8] {
        &self.section[..self.name_len]
    }

    /// Build a response carrying one A record for `address`.
    ///
    /// The answer's owner name is the question's name bytes, uncompressed.
    pub fn encode_answer(&self, address: Ipv4Addr) -> Vec<u8> {
        let mut data =
            Vec::with_capacity(HEADER_LEN + self.section.len() + self.name_len + 14);

        write_header(&mut data, self.id, 1);
        data.extend_from_slice(&self.section);

        data.extend_from_slice(self.raw_name_bytes());
        data.extend_from_slice(&TYPE_A.to_be_bytes());
        data.extend_from_slice(&CLASS_IN.to_be_bytes());
        data.extend_from_slice(&ANSWER_TTL.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes()); // RDLENGTH
        data.extend_from_slice(&address.octets());

        data
    }

    /// Build a response with no answers, for names missing from the table.
    pub fn encode_empty(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.section.len());

        write_header(&mut data, self.id, 0);
        data.extend_from_slice(&self.section);

        data
    }
}

fn write_header(buf: &mut Vec<u8>, id: u16, ancount: u16) {
    buf.extend_from_slice(&id.to_be_bytes());
    buf.push(FLAG_QR);
    buf.push(0x00);
    buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    buf.extend_from_slice(&ancount.to_be_bytes());
    buf.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    buf.extend_from_slice(&[0x00, 0x00]); // ARCOUNT
}
