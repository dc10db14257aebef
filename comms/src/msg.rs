use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize, specs::TaskSpec};

type Word = u64;
const WORD_SIZE: usize = size_of::<Word>();

// Kept as wide as a `f64` so data bodies stay 8 byte aligned after it.
type Header = Word;
const HEADER_SIZE: usize = size_of::<Header>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const DESIGN: Header = 2;
const CLASSIFICATION: Header = 3;
const THETAS: Header = 4;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, PartialEq)]
pub enum Payload<'a> {
    /// Row major `rows x features` design matrix.
    Design(&'a [f64]),
    /// Row major `rows x classes` one-hot classification matrix.
    Classification(&'a [f64]),
    /// Consecutive class thetas starting at `start_index`, each `width` values
    /// long with the intercept first.
    Thetas {
        start_index: usize,
        width: usize,
        values: &'a [f64],
    },
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Train(TaskSpec),
    Progress {
        completed: usize,
        total: usize,
    },
    Diverged {
        class_index: usize,
        iterations: usize,
    },
}

/// The application layer message for the entire system.
#[derive(Debug, PartialEq)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name of the message kind, for logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Train(_)) => "control/train",
            Msg::Control(Command::Progress { .. }) => "control/progress",
            Msg::Control(Command::Diverged { .. }) => "control/diverged",
            Msg::Data(Payload::Design(_)) => "data/design",
            Msg::Data(Payload::Classification(_)) => "data/classification",
            Msg::Data(Payload::Thetas { .. }) => "data/thetas",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {needed} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

fn put_word(buf: &mut Vec<u8>, word: Word) {
    buf.extend_from_slice(&word.to_be_bytes());
}

fn read_word(bytes: &[u8]) -> Word {
    let mut word = [0; WORD_SIZE];
    word.copy_from_slice(&bytes[..WORD_SIZE]);
    Word::from_be_bytes(word)
}

fn floats(bytes: &[u8]) -> io::Result<&[f64]> {
    bytemuck::try_cast_slice(bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid float payload of {} bytes: {e:?}", bytes.len()),
        )
    })
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                put_word(buf, ERR);
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                put_word(buf, CONTROL);
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Design(values)) => {
                put_word(buf, DESIGN);
                Ok(Some(bytemuck::cast_slice(*values)))
            }
            Msg::Data(Payload::Classification(values)) => {
                put_word(buf, CLASSIFICATION);
                Ok(Some(bytemuck::cast_slice(*values)))
            }
            Msg::Data(Payload::Thetas {
                start_index,
                width,
                values,
            }) => {
                put_word(buf, THETAS);
                put_word(buf, *start_index as Word);
                put_word(buf, *width as Word);
                Ok(Some(bytemuck::cast_slice(*values)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);

        match read_word(kind_buf) {
            ERR => {
                let string = std::str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            DESIGN => Ok(Self::Data(Payload::Design(floats(rest)?))),
            CLASSIFICATION => Ok(Self::Data(Payload::Classification(floats(rest)?))),
            THETAS => {
                if rest.len() < 2 * WORD_SIZE {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + 2 * WORD_SIZE);
                }

                let (words, values) = rest.split_at(2 * WORD_SIZE);
                let start_index = read_word(words) as usize;
                let width = read_word(&words[WORD_SIZE..]) as usize;
                let values = floats(values)?;

                let ragged = match width {
                    0 => !values.is_empty(),
                    w => values.len() % w != 0,
                };

                if ragged {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{} theta values can't be split in rows of {width}", values.len()),
                    ));
                }

                Ok(Self::Data(Payload::Thetas {
                    start_index,
                    width,
                    values,
                }))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}
