//! Message templates referenced by the in-kernel probes.
//!
//! Probes can't format strings, so they emit a message code plus up to three
//! integer arguments and user space renders the template. Each entry declares
//! how many arguments it consumes; the declaration is checked against the
//! template's substitution tokens when the catalog is built.
//!
//! Supported tokens: `%d` / `%i` (signed), `%u` (unsigned), `%x` / `%X` (hex),
//! each optionally with an `l` or `ll` length modifier. `%%` renders a literal
//! percent sign and does not consume an argument.

use thiserror::Error;

/// Maximum number of arguments a kernel log record carries.
pub const MAX_ARGS: usize = 3;

/// The probes' compiled-in message table, indexed by message code.
const BPF_LOG_MESSAGES: &[(&str, usize)] = &[
    ("Unable to read ssl info from map, pid: %d", 1),
    ("Unable to get ssl info pointer, ret: %ld", 1),
    ("Unable to read ssl buffer, ret: %ld, address: %lx", 2),
    ("Unable to reserve chunk in perf buffer, size: %u", 1),
    ("Unable to put chunk in perf buffer, ret: %ld, pid: %d, fd: %d", 3),
    ("Unable to read chunk length, buffer size %u exceeds limit", 1),
    ("Unable to read file descriptor from socket", 0),
    ("Unable to lookup go user-kernel context, pid: %d, goid: %lu", 2),
    ("Unable to read go tls connection, ret: %ld", 1),
    ("Socket fd %d not found in connection info map", 1),
    ("Unable to update connection info map, ret: %ld", 1),
    ("Invalid tcp state transition from %u to %u", 2),
    ("Dropped %u%% of chunks for pid: %d", 2),
    ("Unable to read address family, ret: %ld", 1),
    ("Unexpected address family: %x", 1),
    ("Tracer program attached", 0),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Message code {code} declares {declared} argument(s), its template has {found}")]
    ArityMismatch {
        code: usize,
        declared: usize,
        found: usize,
    },

    #[error("Message code {code} has an unsupported substitution token at byte offset {offset}")]
    UnsupportedToken { code: usize, offset: usize },

    #[error("Message code {code} uses {found} arguments, at most 3 are supported")]
    TooManyArgs { code: usize, found: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Conversion {
    Signed,
    Unsigned,
    LowerHex,
    UpperHex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Arg(Conversion),
}

/// A single template together with its declared argument count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    template: String,
    arity: usize,
    segments: Vec<Segment>,
}

impl CatalogEntry {
    fn new(code: usize, template: &str, arity: usize) -> Result<Self, CatalogError> {
        let segments = parse_template(code, template)?;
        let found = segments
            .iter()
            .filter(|s| matches!(s, Segment::Arg(_)))
            .count();
        if found > MAX_ARGS {
            return Err(CatalogError::TooManyArgs { code, found });
        }
        if found != arity {
            return Err(CatalogError::ArityMismatch {
                code,
                declared: arity,
                found,
            });
        }
        Ok(CatalogEntry {
            template: template.to_owned(),
            arity,
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Render the template, substituting the first `arity` arguments in order.
    pub fn format(&self, args: &[u64; MAX_ARGS]) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut next = args.iter();
        for seg in self.segments.iter() {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Arg(conv) => {
                    // Arity is validated at construction, so there is always an argument left
                    let v = next.next().copied().unwrap_or_default();
                    let rendered = match conv {
                        Conversion::Signed => (v as i64).to_string(),
                        Conversion::Unsigned => v.to_string(),
                        Conversion::LowerHex => format!("{v:x}"),
                        Conversion::UpperHex => format!("{v:X}"),
                    };
                    out.push_str(&rendered);
                }
            }
        }
        out
    }
}

fn parse_template(code: usize, template: &str) -> Result<Vec<Segment>, CatalogError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }

        if let Some((_, '%')) = chars.peek() {
            chars.next();
            literal.push('%');
            continue;
        }

        // Length modifiers carry no meaning here, every argument is 64 bits wide
        let mut modifiers = 0;
        while let Some((_, 'l')) = chars.peek() {
            chars.next();
            modifiers += 1;
        }
        if modifiers > 2 {
            return Err(CatalogError::UnsupportedToken { code, offset });
        }

        let conv = match chars.next() {
            Some((_, 'd')) | Some((_, 'i')) => Conversion::Signed,
            Some((_, 'u')) => Conversion::Unsigned,
            Some((_, 'x')) => Conversion::LowerHex,
            Some((_, 'X')) => Conversion::UpperHex,
            _ => return Err(CatalogError::UnsupportedToken { code, offset }),
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Arg(conv));
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Immutable code-to-template table, built once and shared read-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageCatalog {
    entries: Vec<CatalogEntry>,
}

impl MessageCatalog {
    /// Build a catalog from `(template, arity)` pairs; the position of each pair is its code.
    pub fn new<'a, I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(code, (template, arity))| CatalogEntry::new(code, template, arity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MessageCatalog { entries })
    }

    /// The catalog matching the message codes compiled into the tracer's probes.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(BPF_LOG_MESSAGES.iter().copied())
    }

    pub fn get(&self, code: u32) -> Option<&CatalogEntry> {
        usize::try_from(code).ok().and_then(|c| self.entries.get(c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_catalog_is_valid() {
        let cat = MessageCatalog::builtin().unwrap();
        assert_eq!(cat.len(), BPF_LOG_MESSAGES.len());
        assert!(cat.get(cat.len() as u32).is_none());
    }

    #[test]
    fn substitutes_declared_args_in_order() {
        let cat = MessageCatalog::new([
            ("none", 0),
            ("one %d", 1),
            ("two %d %u", 2),
            ("three %d-%d-%d", 3),
        ])
        .unwrap();
        let args = [7, 8, 9];
        assert_eq!(cat.get(0).unwrap().format(&args), "none");
        assert_eq!(cat.get(1).unwrap().format(&args), "one 7");
        assert_eq!(cat.get(2).unwrap().format(&args), "two 7 8");
        assert_eq!(cat.get(3).unwrap().format(&args), "three 7-8-9");
    }

    #[test]
    fn conversions() {
        let cat = MessageCatalog::new([("%d %lu %llx", 3), ("%i", 1), ("0x%X", 1)]).unwrap();
        let e = cat.get(0).unwrap();
        assert_eq!(e.arity(), 3);
        assert_eq!(e.format(&[u64::MAX, u64::MAX, 255]), "-1 18446744073709551615 ff");
        assert_eq!(cat.get(1).unwrap().format(&[(-22_i64) as u64, 0, 0]), "-22");
        assert_eq!(cat.get(2).unwrap().format(&[0xbeef, 0, 0]), "0xBEEF");
    }

    #[test]
    fn literal_percent_is_not_a_token() {
        let cat = MessageCatalog::new([("100%% done", 0), ("Dropped %u%% of %d", 2)]).unwrap();
        assert_eq!(cat.get(0).unwrap().format(&[1, 2, 3]), "100% done");
        assert_eq!(cat.get(1).unwrap().format(&[40, 5, 0]), "Dropped 40% of 5");

        // A literal percent must not count towards the arity
        assert_eq!(
            MessageCatalog::new([("100%% done", 1)]),
            Err(CatalogError::ArityMismatch {
                code: 0,
                declared: 1,
                found: 0
            })
        );
    }

    #[test]
    fn rejects_bad_templates() {
        assert_eq!(
            MessageCatalog::new([("ok", 0), ("bad %s", 1)]),
            Err(CatalogError::UnsupportedToken { code: 1, offset: 4 })
        );
        assert_eq!(
            MessageCatalog::new([("trailing %", 1)]),
            Err(CatalogError::UnsupportedToken { code: 0, offset: 9 })
        );
        assert_eq!(
            MessageCatalog::new([("%d %d %d %d", 4)]),
            Err(CatalogError::TooManyArgs { code: 0, found: 4 })
        );
        assert_eq!(
            MessageCatalog::new([("%d %d", 1)]),
            Err(CatalogError::ArityMismatch {
                code: 0,
                declared: 1,
                found: 2
            })
        );
    }
}
