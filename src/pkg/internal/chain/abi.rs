//! Minimal contract ABI codec covering the types the marketplace contracts use.
//!
//! Calls are encoded as `selector || head || tail` where static values occupy
//! one 32 byte head word and strings are referenced by offset into the tail.

use sha3::{Digest, Keccak256};

use super::{Address, H256, HexBytes};
use crate::pkg::internal::failure::{Failure, Outcome};

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint8,
    Uint256,
    String,
}

impl ParamType {
    fn canonical(&self) -> &'static str {
        match self {
            ParamType::Address => "address",
            ParamType::Uint8 => "uint8",
            ParamType::Uint256 => "uint256",
            ParamType::String => "string",
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::String)
    }
}

/// A decoded or to-be-encoded argument. Unsigned values are capped at 128 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    String(String),
}

impl Token {
    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<u128> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub name: &'static str,
    pub inputs: &'static [ParamType],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventParam {
    pub kind: ParamType,
    pub indexed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub name: &'static str,
    pub inputs: &'static [EventParam],
}

pub const CREATE_PROFILE: Function = Function {
    name: "createProfile",
    inputs: &[
        ParamType::String,
        ParamType::Uint8,
        ParamType::String,
        ParamType::String,
        ParamType::String,
    ],
};

pub const COMPLETE_POSTING: Function = Function {
    name: "completePosting",
    inputs: &[ParamType::String],
};

pub const COMPLETE_PROJECT: Function = Function {
    name: "completeProject",
    inputs: &[ParamType::Address, ParamType::Uint256],
};

pub const PROFILE_CREATED: Event = Event {
    name: "ProfileCreated",
    inputs: &[
        EventParam { kind: ParamType::Address, indexed: true },
        EventParam { kind: ParamType::Uint256, indexed: false },
    ],
};

pub const POSTING_COMPLETED: Event = Event {
    name: "PostingCompleted",
    inputs: &[
        EventParam { kind: ParamType::Address, indexed: true },
        EventParam { kind: ParamType::String, indexed: false },
    ],
};

pub const PROJECT_COMPLETED: Event = Event {
    name: "ProjectCompleted",
    inputs: &[
        EventParam { kind: ParamType::Address, indexed: true },
        EventParam { kind: ParamType::String, indexed: false },
        EventParam { kind: ParamType::Address, indexed: true },
    ],
};

fn signature<'a>(name: &str, kinds: impl Iterator<Item = &'a ParamType>) -> String {
    let params: Vec<&str> = kinds.map(ParamType::canonical).collect();
    format!("{}({})", name, params.join(","))
}

impl Function {
    pub fn signature(&self) -> String {
        signature(self.name, self.inputs.iter())
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    pub fn encode_call(&self, args: &[Token]) -> Outcome<HexBytes> {
        if args.len() != self.inputs.len() {
            return Err(Failure::InvalidArgument(format!(
                "{} takes {} arguments, got {}",
                self.name,
                self.inputs.len(),
                args.len()
            )));
        }
        let mut out = self.selector().to_vec();
        out.extend(encode(self.inputs, args)?);
        Ok(HexBytes(out))
    }
}

impl Event {
    pub fn signature(&self) -> String {
        signature(self.name, self.inputs.iter().map(|p| &p.kind))
    }

    pub fn topic(&self) -> H256 {
        H256(keccak256(self.signature().as_bytes()))
    }

    /// Decodes a log into tokens in declaration order.
    pub fn decode(&self, topics: &[H256], data: &[u8]) -> Outcome<Vec<Token>> {
        match topics.first() {
            Some(t) if *t == self.topic() => {}
            _ => {
                return Err(Failure::InvalidArgument(format!(
                    "log is not a {} event",
                    self.name
                )));
            }
        }
        let body: Vec<ParamType> = self
            .inputs
            .iter()
            .filter(|p| !p.indexed)
            .map(|p| p.kind)
            .collect();
        let mut body = decode(&body, data)?.into_iter();
        let mut indexed = topics[1..].iter();
        self.inputs
            .iter()
            .map(|param| {
                if param.indexed {
                    let topic = indexed.next().ok_or_else(|| {
                        Failure::InvalidArgument(format!("{} is missing a topic", self.name))
                    })?;
                    decode_word(param.kind, &topic.0)
                } else {
                    body.next().ok_or_else(|| {
                        Failure::InvalidArgument(format!("{} data is truncated", self.name))
                    })
                }
            })
            .collect()
    }
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % WORD;
    if rem != 0 {
        out.resize(out.len() + WORD - rem, 0);
    }
    out
}

fn mismatch(kind: ParamType, token: &Token) -> Failure {
    Failure::InvalidArgument(format!("expected {}, got {:?}", kind.canonical(), token))
}

fn encode(kinds: &[ParamType], args: &[Token]) -> Outcome<Vec<u8>> {
    let mut head = Vec::with_capacity(kinds.len() * WORD);
    let mut tail = Vec::new();
    let head_len = kinds.len() * WORD;
    for (kind, token) in kinds.iter().zip(args) {
        match (kind, token) {
            (ParamType::Address, Token::Address(addr)) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(&addr.0);
                head.extend_from_slice(&word);
            }
            (ParamType::Uint8, Token::Uint(v)) => {
                if *v > u8::MAX as u128 {
                    return Err(Failure::InvalidArgument(format!("{} does not fit uint8", v)));
                }
                head.extend_from_slice(&uint_word(*v));
            }
            (ParamType::Uint256, Token::Uint(v)) => head.extend_from_slice(&uint_word(*v)),
            (ParamType::String, Token::String(s)) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(s.len() as u128));
                tail.extend(padded(s.as_bytes()));
            }
            (kind, token) => return Err(mismatch(*kind, token)),
        }
    }
    head.extend(tail);
    Ok(head)
}

fn out_of_range(at: usize) -> Failure {
    Failure::InvalidArgument(format!("data too short at offset {}", at))
}

fn read_word(data: &[u8], at: usize) -> Outcome<&[u8]> {
    let end = at.checked_add(WORD).ok_or_else(|| out_of_range(at))?;
    data.get(at..end).ok_or_else(|| out_of_range(at))
}

fn word_to_usize(word: &[u8]) -> Outcome<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(Failure::InvalidArgument("offset out of range".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf) as usize)
}

fn decode_word(kind: ParamType, word: &[u8]) -> Outcome<Token> {
    match kind {
        ParamType::Address => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address(addr)))
        }
        ParamType::Uint8 | ParamType::Uint256 => {
            if word[..16].iter().any(|b| *b != 0) {
                return Err(Failure::InvalidArgument("uint exceeds 128 bits".into()));
            }
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&word[16..]);
            Ok(Token::Uint(u128::from_be_bytes(buf)))
        }
        // indexed strings are hashed into the topic and cannot be recovered
        ParamType::String => Err(Failure::InvalidArgument(
            "string value is not recoverable from a single word".into(),
        )),
    }
}

fn decode(kinds: &[ParamType], data: &[u8]) -> Outcome<Vec<Token>> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let word = read_word(data, i * WORD)?;
            if !kind.is_dynamic() {
                return decode_word(*kind, word);
            }
            let offset = word_to_usize(word)?;
            let len = word_to_usize(read_word(data, offset)?)?;
            let past = || Failure::InvalidArgument("string runs past data".into());
            let start = offset.checked_add(WORD).ok_or_else(past)?;
            let end = start.checked_add(len).ok_or_else(past)?;
            let bytes = data.get(start..end).ok_or_else(past)?;
            String::from_utf8(bytes.to_vec())
                .map(Token::String)
                .map_err(|e| Failure::InvalidArgument(e.to_string()))
        })
        .collect()
}
