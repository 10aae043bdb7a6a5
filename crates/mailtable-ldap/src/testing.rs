//! Scripted directory sessions for unit tests

use crate::connection::{Connector, LdapUrl};
use crate::protocol::{
    DirectorySession, LdapResult, MessageId, MessageKind, PageCursor, ProtocolMessage,
    SearchEntry, SearchRequest, RESULT_SUCCESS,
};
use crate::registry::DirectoryConfig;
use async_trait::async_trait;
use mailtable_common::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) fn test_config() -> DirectoryConfig {
    DirectoryConfig {
        identifier: "test".to_string(),
        url: "ldap://ldap.example.com".to_string(),
        username: "cn=smtpd,dc=example,dc=com".to_string(),
        password: "secret".to_string(),
        basedn: "dc=example,dc=com".to_string(),
        filter: "(mail=%k)".to_string(),
        attribute: "mailForward".to_string(),
        page_size: 2,
    }
}

fn success() -> LdapResult {
    LdapResult {
        code: RESULT_SUCCESS,
        matched_dn: String::new(),
        message: String::new(),
    }
}

/// One scripted response within a page
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Entry carrying `mailForward` values
    Entry(Vec<&'static str>),
    /// Entry with a different message id than the request
    StrayEntry(Vec<&'static str>),
    /// Arbitrary operation
    Kind(MessageKind),
    /// End of page; an empty cookie ends the search
    Done(&'static [u8]),
}

/// A search request as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedSearch {
    pub base_dn: String,
    pub filter: String,
    pub attribute: String,
    pub cookie: Option<Vec<u8>>,
}

/// In-memory session answering requests from a script
#[derive(Debug)]
pub(crate) struct ScriptedSession {
    bind_result: u32,
    pages: VecDeque<Vec<Reply>>,
    pending: VecDeque<ProtocolMessage>,
    last_id: MessageId,
    pub binds: Vec<(String, String)>,
    pub searches: Vec<RecordedSearch>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            bind_result: RESULT_SUCCESS,
            pages: VecDeque::new(),
            pending: VecDeque::new(),
            last_id: 0,
            binds: Vec::new(),
            searches: Vec::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_bind_result(mut self, code: u32) -> Self {
        self.bind_result = code;
        self
    }

    /// Queue the responses for the next search request
    pub fn with_page(mut self, replies: Vec<Reply>) -> Self {
        self.pages.push_back(replies);
        self
    }

    fn with_closed_flag(mut self, closed: Arc<AtomicBool>) -> Self {
        self.closed = closed;
        self
    }

    fn next_id(&mut self) -> MessageId {
        self.last_id += 1;
        self.last_id
    }

    fn entry(values: Vec<&'static str>) -> MessageKind {
        MessageKind::SearchEntry(SearchEntry {
            dn: "uid=test,dc=example,dc=com".to_string(),
            attributes: vec![(
                "mailForward".to_string(),
                values.into_iter().map(String::from).collect(),
            )],
        })
    }
}

#[async_trait]
impl DirectorySession for ScriptedSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<MessageId> {
        let id = self.next_id();
        self.binds.push((dn.to_string(), password.to_string()));
        self.pending.push_back(ProtocolMessage {
            id,
            kind: MessageKind::BindResponse(LdapResult {
                code: self.bind_result,
                ..success()
            }),
        });
        Ok(id)
    }

    async fn search(
        &mut self,
        request: &SearchRequest<'_>,
        cursor: Option<&PageCursor>,
    ) -> Result<MessageId> {
        let id = self.next_id();
        self.searches.push(RecordedSearch {
            base_dn: request.base_dn.to_string(),
            filter: request.filter.to_string(),
            attribute: request.attribute.to_string(),
            cookie: cursor.map(|c| c.as_bytes().to_vec()),
        });

        let page = self
            .pages
            .pop_front()
            .ok_or_else(|| Error::Protocol("no scripted page left".to_string()))?;

        for reply in page {
            let message = match reply {
                Reply::Entry(values) => ProtocolMessage {
                    id,
                    kind: Self::entry(values),
                },
                Reply::StrayEntry(values) => ProtocolMessage {
                    id: id + 100,
                    kind: Self::entry(values),
                },
                Reply::Kind(kind) => ProtocolMessage { id, kind },
                Reply::Done(cookie) => ProtocolMessage {
                    id,
                    kind: MessageKind::SearchResult {
                        result: success(),
                        cursor: PageCursor::new(cookie.to_vec()),
                    },
                },
            };
            self.pending.push_back(message);
        }

        Ok(id)
    }

    async fn next_message(&mut self) -> Result<ProtocolMessage> {
        self.pending
            .pop_front()
            .ok_or_else(|| Error::Protocol("connection closed by server".to_string()))
    }

    async fn discard_pending(&mut self) {
        self.pending.clear();
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

type SessionFactory = Box<dyn Fn() -> ScriptedSession + Send + Sync>;

/// Connector handing out scripted sessions
pub(crate) struct ScriptedConnector {
    factory: SessionFactory,
    closed: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> ScriptedSession + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            closed: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Flag set when any session from this connector is closed
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    pub fn connect_count(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self, _url: &LdapUrl) -> Result<ScriptedSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok((self.factory)().with_closed_flag(self.closed.clone()))
    }
}

/// Loopback directory server speaking just enough LDAP for wire tests
pub(crate) mod directory {
    use bytes::BytesMut;
    use lber::common::TagClass;
    use lber::parse::parse_tag;
    use lber::structure::{StructureTag, PL};
    use lber::structures::{ASNTag, Enumerated, Integer, OctetString, Sequence, Set, Tag};
    use lber::write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    pub const OP_BIND_REQUEST: u64 = 0;
    pub const OP_UNBIND_REQUEST: u64 = 2;
    pub const OP_SEARCH_REQUEST: u64 = 3;

    const OP_BIND_RESPONSE: u64 = 1;
    const OP_SEARCH_ENTRY: u64 = 4;
    const OP_SEARCH_DONE: u64 = 5;
    const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

    /// Message id and operation tag of a client request
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Request {
        pub id: i32,
        pub op: u64,
    }

    /// Read the next request, or `None` once the client hangs up
    pub async fn read_request(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<Request> {
        loop {
            let parsed = parse_tag(&buf[..])
                .ok()
                .map(|(rest, tag)| (buf.len() - rest.len(), tag));
            if let Some((consumed, tag)) = parsed {
                buf.drain(..consumed);
                return Some(request_of(tag));
            }

            let mut chunk = [0u8; 1024];
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return None,
                Ok(read) => buf.extend_from_slice(&chunk[..read]),
            }
        }
    }

    fn request_of(tag: StructureTag) -> Request {
        let PL::C(children) = tag.payload else {
            panic!("request is not a sequence");
        };
        let id = match &children[0].payload {
            PL::P(bytes) => bytes.iter().fold(0i32, |acc, b| (acc << 8) | i32::from(*b)),
            PL::C(_) => panic!("message id is not an integer"),
        };
        Request {
            id,
            op: children[1].id,
        }
    }

    fn octets(value: &[u8]) -> Tag {
        Tag::OctetString(OctetString {
            inner: value.to_vec(),
            ..Default::default()
        })
    }

    fn sequence(inner: Vec<Tag>) -> Tag {
        Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        })
    }

    fn encode(tag: Tag) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write::encode_into(&mut buf, tag.into_structure()).unwrap();
        buf.to_vec()
    }

    fn message(id: i32, op: Tag, controls: Option<Tag>) -> Vec<u8> {
        let mut inner = vec![
            Tag::Integer(Integer {
                inner: i64::from(id),
                ..Default::default()
            }),
            op,
        ];
        inner.extend(controls);
        encode(sequence(inner))
    }

    fn result(op: u64, code: u32) -> Tag {
        Tag::Sequence(Sequence {
            id: op,
            class: TagClass::Application,
            inner: vec![
                Tag::Enumerated(Enumerated {
                    inner: i64::from(code),
                    ..Default::default()
                }),
                octets(b""),
                octets(b""),
            ],
        })
    }

    pub fn bind_response(id: i32, code: u32) -> Vec<u8> {
        message(id, result(OP_BIND_RESPONSE, code), None)
    }

    pub fn search_entry(id: i32, dn: &str, attribute: &str, values: &[&str]) -> Vec<u8> {
        let attribute = sequence(vec![
            octets(attribute.as_bytes()),
            Tag::Set(Set {
                inner: values.iter().map(|v| octets(v.as_bytes())).collect(),
                ..Default::default()
            }),
        ]);
        let op = Tag::Sequence(Sequence {
            id: OP_SEARCH_ENTRY,
            class: TagClass::Application,
            inner: vec![octets(dn.as_bytes()), sequence(vec![attribute])],
        });
        message(id, op, None)
    }

    /// Search completion carrying a paged-results response control
    pub fn search_done(id: i32, code: u32, cookie: &[u8]) -> Vec<u8> {
        let value = encode(sequence(vec![
            Tag::Integer(Integer {
                inner: 0,
                ..Default::default()
            }),
            octets(cookie),
        ]));
        let controls = Tag::Sequence(Sequence {
            id: 0,
            class: TagClass::Context,
            inner: vec![sequence(vec![octets(PAGED_RESULTS_OID.as_bytes()), octets(&value)])],
        });
        message(id, result(OP_SEARCH_DONE, code), Some(controls))
    }

    pub async fn reply(stream: &mut TcpStream, frames: &[Vec<u8>]) {
        for frame in frames {
            stream.write_all(frame).await.unwrap();
        }
    }
}
