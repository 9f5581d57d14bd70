//! DNS message parsing and construction.
//!
//! Only what the proxy needs: read the first question of a query, and
//! write a reply carrying `A` answers for it.

use crate::record::normalize;
use crate::resolver::Answer;

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;

pub const TYPE_A: u16 = 1;
pub const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;

const FLAG_QR: u16 = 0x8000;
const FLAG_RA: u16 = 0x0080;
const MASK_OPCODE_RD: u16 = 0x7900;

/// A parsed DNS query.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub id: u16,
    pub flags: u16,
    /// Normalized name of the first question.
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
    /// Raw bytes of the first question (name, type, class), echoed in replies.
    question: Vec<u8>,
}

impl DnsQuery {
    /// Parse a DNS query from raw bytes.
    ///
    /// Returns `None` for responses, packets without a question, compressed
    /// or oversized question names, and truncated packets.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN + 1 {
            return None;
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let flags = u16::from_be_bytes([data[2], data[3]]);
        let qdcount = u16::from_be_bytes([data[4], data[5]]);
        if flags & FLAG_QR != 0 || qdcount == 0 {
            return None;
        }

        // Parse domain name
        let mut pos = HEADER_LEN;
        let mut labels = Vec::new();
        let mut name_len = 0;

        loop {
            let label_len = *data.get(pos)? as usize;
            pos += 1;
            if label_len == 0 {
                break;
            }
            if label_len & 0xC0 != 0 {
                return None;
            }
            name_len += label_len + 1;
            if name_len > MAX_NAME_LEN || pos + label_len > data.len() {
                return None;
            }
            labels.push(std::str::from_utf8(&data[pos..pos + label_len]).ok()?);
            pos += label_len;
        }

        if labels.is_empty() {
            return None;
        }

        // Parse QTYPE and QCLASS
        if pos + 4 > data.len() {
            return None;
        }
        let qtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
        let qclass = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);

        Some(Self {
            id,
            flags,
            domain: normalize(&labels.join(".")),
            qtype,
            qclass,
            question: data[HEADER_LEN..pos + 4].to_vec(),
        })
    }

    /// Whether the question asks for IPv4 addresses.
    pub fn wants_a(&self) -> bool {
        self.qclass == CLASS_IN && (self.qtype == TYPE_A || self.qtype == TYPE_ANY)
    }
}

/// A DNS response to one query.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub id: u16,
    pub flags: u16,
    question: Vec<u8>,
    pub answers: Vec<DnsRecord>,
}

/// An `A` resource record owned by the question name.
#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub ttl: u32,
    pub rdata: [u8; 4],
}

impl DnsResponse {
    /// Reply to `query` with the given answers; an empty slice gives an
    /// empty NOERROR reply.
    pub fn new(query: &DnsQuery, answers: &[Answer]) -> Self {
        Self {
            id: query.id,
            flags: FLAG_QR | FLAG_RA | (query.flags & MASK_OPCODE_RD),
            question: query.question.clone(),
            answers: answers
                .iter()
                .map(|a| DnsRecord {
                    ttl: a.ttl,
                    rdata: a.addr.octets(),
                })
                .collect(),
        }
    }

    /// Encode the response to wire format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.question.len() + 16 * self.answers.len());

        // Header
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        data.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        data.extend_from_slice(&self.question);

        for a in &self.answers {
            data.extend_from_slice(&[0xC0, 0x0C]); // Pointer to the question name
            data.extend_from_slice(&TYPE_A.to_be_bytes());
            data.extend_from_slice(&CLASS_IN.to_be_bytes());
            data.extend_from_slice(&a.ttl.to_be_bytes());
            data.extend_from_slice(&(a.rdata.len() as u16).to_be_bytes());
            data.extend_from_slice(&a.rdata);
        }

        data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    pub(crate) fn build_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
        let mut packet = Vec::with_capacity(512);

        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query, RD
        packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
        packet.extend_from_slice(&[0x00, 0x00]);
        packet.extend_from_slice(&[0x00, 0x00]);
        packet.extend_from_slice(&[0x00, 0x00]);

        for label in name.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0x00);

        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x01]); // Class: IN

        packet
    }

    #[test]
    fn parse_reads_first_question() {
        let query = DnsQuery::parse(&build_query(0x1234, "WWW.Example.com", TYPE_A)).unwrap();

        assert_eq!(query.id, 0x1234);
        assert_eq!(query.domain, "www.example.com");
        assert_eq!(query.qtype, TYPE_A);
        assert!(query.wants_a());
    }

    #[test]
    fn parse_rejects_malformed_packets() {
        let good = build_query(1, "example.com", TYPE_A);

        assert!(DnsQuery::parse(&good[..10]).is_none());
        assert!(DnsQuery::parse(&good[..good.len() - 2]).is_none());

        let mut no_question = good.clone();
        no_question[5] = 0;
        assert!(DnsQuery::parse(&no_question).is_none());

        let mut response = good.clone();
        response[2] |= 0x80;
        assert!(DnsQuery::parse(&response).is_none());

        let mut compressed = good.clone();
        compressed[HEADER_LEN] = 0xC0;
        assert!(DnsQuery::parse(&compressed).is_none());
    }

    #[test]
    fn aaaa_query_does_not_want_a() {
        let query = DnsQuery::parse(&build_query(1, "example.com", 28)).unwrap();

        assert!(!query.wants_a());
    }

    #[test]
    fn response_echoes_question_and_encodes_answers() {
        let packet = build_query(0xBEEF, "Example.com", TYPE_A);
        let query = DnsQuery::parse(&packet).unwrap();
        let answers = [
            Answer {
                domain: "example.com".into(),
                addr: Ipv4Addr::new(93, 184, 216, 34),
                ttl: 299,
            },
            Answer {
                domain: "example.com".into(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 299,
            },
        ];

        let bytes = DnsResponse::new(&query, &answers).to_bytes();

        assert_eq!(&bytes[0..2], &[0xBE, 0xEF]);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 0x8180);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 2);
        // question copied verbatim, original case included
        assert_eq!(&bytes[HEADER_LEN..packet.len()], &packet[HEADER_LEN..]);

        let first = &bytes[packet.len()..packet.len() + 16];
        assert_eq!(&first[0..2], &[0xC0, 0x0C]);
        assert_eq!(u16::from_be_bytes([first[2], first[3]]), TYPE_A);
        assert_eq!(u32::from_be_bytes([first[6], first[7], first[8], first[9]]), 299);
        assert_eq!(&first[10..12], &[0x00, 0x04]);
        assert_eq!(&first[12..16], &[93, 184, 216, 34]);
        assert_eq!(bytes.len(), packet.len() + 32);
    }

    #[test]
    fn empty_response_has_no_answers() {
        let packet = build_query(7, "bad.com", TYPE_A);
        let query = DnsQuery::parse(&packet).unwrap();

        let bytes = DnsResponse::new(&query, &[]).to_bytes();

        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 0);
        assert_eq!(bytes.len(), packet.len());
        assert_eq!(bytes[3] & 0x0F, 0); // NOERROR
    }
}
