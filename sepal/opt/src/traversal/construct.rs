use super::Pass;
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use sepal_utils::{OutputFile, SepalResult};

#[derive(Clone)]
/// The value returned from parsing an option.
pub enum ParseVal {
    /// A boolean option.
    Bool(bool),
    /// A number option.
    Num(i64),
    /// A free-form string option.
    String(String),
    /// A list of values.
    List(Vec<ParseVal>),
    /// An output stream (stdout, stderr, file name)
    OutStream(OutputFile),
}

impl ParseVal {
    pub fn bool(&self) -> bool {
        let ParseVal::Bool(b) = self else {
            panic!("Expected bool, got {self}");
        };
        *b
    }

    pub fn num(&self) -> i64 {
        let ParseVal::Num(n) = self else {
            panic!("Expected number, got {self}");
        };
        *n
    }

    pub fn pos_num(&self) -> Option<u64> {
        let n = self.num();
        if n < 0 { None } else { Some(n as u64) }
    }

    pub fn string(&self) -> &str {
        let ParseVal::String(s) = self else {
            panic!("Expected string, got {self}");
        };
        s
    }

    pub fn num_list(&self) -> Vec<i64> {
        match self {
            ParseVal::List(l) => {
                l.iter().map(ParseVal::num).collect::<Vec<_>>()
            }
            _ => panic!("Expected list of numbers, got {self}"),
        }
    }

    /// Returns an output stream if it is not the null stream
    pub fn not_null_outstream(&self) -> Option<OutputFile> {
        match self {
            ParseVal::OutStream(o) => {
                if o.is_null() {
                    None
                } else {
                    Some(o.clone())
                }
            }
            _ => panic!("Expected output stream, got {self}"),
        }
    }
}

impl std::fmt::Display for ParseVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseVal::Bool(b) => write!(f, "{b}"),
            ParseVal::Num(n) => write!(f, "{n}"),
            ParseVal::String(s) => write!(f, "{s}"),
            ParseVal::List(l) => {
                write!(f, "[")?;
                for (i, e) in l.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            ParseVal::OutStream(o) => write!(f, "{o}"),
        }
    }
}

/// Option that can be passed to a pass.
pub struct PassOpt {
    name: &'static str,
    description: &'static str,
    default: ParseVal,
    parse: fn(&str) -> Option<ParseVal>,
}

impl PassOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: ParseVal,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Self {
        Self {
            name,
            description,
            default,
            parse,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> &ParseVal {
        &self.default
    }

    fn parse(&self, s: &str) -> Option<ParseVal> {
        (self.parse)(s)
    }

    /// Parse of list using parser for the elements.
    /// Returns `None` if any of the elements fail to parse.
    fn parse_list(
        s: &str,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Option<ParseVal> {
        let mut res = Vec::new();
        for e in s.split(',') {
            res.push(parse(e)?);
        }
        Some(ParseVal::List(res))
    }

    pub fn parse_bool(s: &str) -> Option<ParseVal> {
        match s {
            "true" => Some(ParseVal::Bool(true)),
            "false" => Some(ParseVal::Bool(false)),
            _ => None,
        }
    }

    /// Parse a number from a string.
    pub fn parse_num(s: &str) -> Option<ParseVal> {
        s.parse::<i64>().ok().map(ParseVal::Num)
    }

    /// Parse a list of numbers from a string.
    pub fn parse_num_list(s: &str) -> Option<ParseVal> {
        Self::parse_list(s, Self::parse_num)
    }

    pub fn parse_string(s: &str) -> Option<ParseVal> {
        Some(ParseVal::String(s.to_string()))
    }

    pub fn parse_outstream(s: &str) -> Option<ParseVal> {
        s.parse::<OutputFile>().ok().map(ParseVal::OutStream)
    }
}

/// Trait that describes named things. Calling [`do_pass_default`](Pass::do_pass_default)
/// requires this to be implemented.
///
/// This has to be a separate trait from [`Pass`] because these methods don't
/// receive `self` which means that it is impossible to create dynamic trait
/// objects.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
    /// Set of options that can be passed to the pass.
    fn opts() -> Vec<PassOpt> {
        vec![]
    }
}

/// Trait defining methods used to construct a pass from the option strings
/// handed to the pass manager. This is useful when a pass needs to parse
/// its configuration *before* touching the design.
///
/// For passes that don't take options, this trait can automatically be
/// derived from [Default].
pub trait ConstructPass {
    fn get_opts(extra_opts: &[String]) -> LinkedHashMap<&'static str, ParseVal>
    where
        Self: Named,
    {
        let opts = Self::opts();
        let n = Self::name();
        let mut values: LinkedHashMap<&'static str, ParseVal> = extra_opts
            .iter()
            .filter_map(|raw| {
                // The format is either -x pass:opt or -x pass:opt=val.
                // Only the first ':' and '=' split; values keep any
                // further separators (scope-depths carries `label=depth`
                // bindings).
                let (pass, rest) = raw.split_once(':')?;
                if pass != n {
                    return None;
                }
                let (name, val) = match rest.split_once('=') {
                    Some((name, val)) => (name, Some(val)),
                    None => (rest, None),
                };
                let Some(opt) = opts.iter().find(|o| o.name == name) else {
                    log::warn!(
                        "Ignoring unknown option for pass `{n}`: {name}"
                    );
                    return None;
                };
                let val = match val {
                    Some(v) => {
                        let Some(v) = opt.parse(v) else {
                            log::warn!(
                                "Ignoring invalid value for option `{n}:{}`: {v}",
                                opt.name(),
                            );
                            return None;
                        };
                        v
                    }
                    None => ParseVal::Bool(true),
                };
                Some((opt.name(), val))
            })
            .collect();

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Extra options for {}: {}",
                Self::name(),
                values.iter().map(|(o, v)| format!("{o}->{v}")).join(", ")
            );
        }

        // For all options that were not provided with values, fill in the
        // defaults.
        for opt in opts {
            if !values.contains_key(opt.name()) {
                values.insert(opt.name(), opt.default.clone());
            }
        }

        values
    }

    /// Construct the pass from the option strings.
    fn from(extra_opts: &[String]) -> SepalResult<Self>
    where
        Self: Sized;

    /// Clear the data stored in the pass so an instance can be reused.
    fn clear_data(&mut self);
}

/// Derive ConstructPass when [Default] is provided for a pass.
impl<T: Default + Sized + Pass> ConstructPass for T {
    fn from(_extra_opts: &[String]) -> SepalResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Named for Probe {
        fn name() -> &'static str {
            "probe"
        }

        fn description() -> &'static str {
            "fixture for option parsing"
        }

        fn opts() -> Vec<PassOpt> {
            vec![
                PassOpt::new(
                    "trace",
                    "enable tracing",
                    ParseVal::Bool(false),
                    PassOpt::parse_bool,
                ),
                PassOpt::new(
                    "limit",
                    "iteration cap",
                    ParseVal::Num(16),
                    PassOpt::parse_num,
                ),
                PassOpt::new(
                    "widths",
                    "candidate widths",
                    ParseVal::List(Vec::new()),
                    PassOpt::parse_num_list,
                ),
                PassOpt::new(
                    "tag",
                    "free-form label",
                    ParseVal::String(String::new()),
                    PassOpt::parse_string,
                ),
                PassOpt::new(
                    "report",
                    "where to write the report",
                    ParseVal::OutStream(OutputFile::Null),
                    PassOpt::parse_outstream,
                ),
            ]
        }
    }

    impl ConstructPass for Probe {
        fn from(_extra_opts: &[String]) -> SepalResult<Self> {
            Ok(Probe)
        }

        fn clear_data(&mut self) {}
    }

    fn get(raw: &[&str]) -> LinkedHashMap<&'static str, ParseVal> {
        let raw: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        <Probe as ConstructPass>::get_opts(&raw)
    }

    #[test]
    fn values_parse_and_defaults_fill_in() {
        let opts =
            get(&["probe:widths=8,16,32", "probe:trace", "other:limit=3"]);
        assert_eq!(opts["widths"].num_list(), vec![8, 16, 32]);
        assert!(opts["trace"].bool());
        // `other:limit` addresses a different pass; the default stays.
        assert_eq!(opts["limit"].num(), 16);
        assert!(opts["report"].not_null_outstream().is_none());
    }

    #[test]
    fn bad_values_fall_back_to_the_default() {
        let opts = get(&["probe:widths=8,sixteen", "probe:unknown=1"]);
        assert!(opts["widths"].num_list().is_empty());
        assert_eq!(opts["limit"].num(), 16);
    }

    #[test]
    fn only_the_first_separators_split() {
        // The value keeps any later ':' and '=' untouched.
        let opts = get(&["probe:tag=a=b:c"]);
        assert_eq!(opts["tag"].string(), "a=b:c");
    }
}
