//! Core type definitions for the matching engine.
//!
//! These types describe the closed option vocabulary of AdBlock Plus network
//! rules and the request context a URL is evaluated against.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Binary Options
// =============================================================================

/// A named boolean option a rule can require present (`script`) or absent (`~script`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOption {
    Script,
    Image,
    Stylesheet,
    Object,
    XmlHttpRequest,
    ObjectSubrequest,
    Subdocument,
    Document,
    Elemhide,
    Other,
    Background,
    Xbl,
    Ping,
    Dtd,
    Media,
    ThirdParty,
    MatchCase,
    Collapse,
    DoNotTrack,
    Popup,
}

impl BinaryOption {
    /// Every binary option, in canonical order.
    pub const ALL: [BinaryOption; 20] = [
        Self::Script,
        Self::Image,
        Self::Stylesheet,
        Self::Object,
        Self::XmlHttpRequest,
        Self::ObjectSubrequest,
        Self::Subdocument,
        Self::Document,
        Self::Elemhide,
        Self::Other,
        Self::Background,
        Self::Xbl,
        Self::Ping,
        Self::Dtd,
        Self::Media,
        Self::ThirdParty,
        Self::MatchCase,
        Self::Collapse,
        Self::DoNotTrack,
        Self::Popup,
    ];

    /// Option name as written in filter lists.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
            Self::Object => "object",
            Self::XmlHttpRequest => "xmlhttprequest",
            Self::ObjectSubrequest => "object-subrequest",
            Self::Subdocument => "subdocument",
            Self::Document => "document",
            Self::Elemhide => "elemhide",
            Self::Other => "other",
            Self::Background => "background",
            Self::Xbl => "xbl",
            Self::Ping => "ping",
            Self::Dtd => "dtd",
            Self::Media => "media",
            Self::ThirdParty => "third-party",
            Self::MatchCase => "match-case",
            Self::Collapse => "collapse",
            Self::DoNotTrack => "donottrack",
            Self::Popup => "popup",
        }
    }

    /// Look up an option by its filter-list name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|opt| opt.name() == name)
    }

    /// The single-bit mask for this option.
    pub const fn mask(self) -> OptionMask {
        OptionMask::from_bits_retain(1 << self as u32)
    }
}

impl fmt::Display for BinaryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an option name is not part of the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown option '{0}'")]
pub struct UnknownOption(pub String);

impl FromStr for BinaryOption {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownOption(s.to_string()))
    }
}

// =============================================================================
// Option Masks
// =============================================================================

bitflags::bitflags! {
    /// Set of option keys: one bit per binary option plus `domain`.
    ///
    /// Bit positions follow the declaration order of [`BinaryOption`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OptionMask: u32 {
        const SCRIPT = 1 << 0;
        const IMAGE = 1 << 1;
        const STYLESHEET = 1 << 2;
        const OBJECT = 1 << 3;
        const XMLHTTPREQUEST = 1 << 4;
        const OBJECT_SUBREQUEST = 1 << 5;
        const SUBDOCUMENT = 1 << 6;
        const DOCUMENT = 1 << 7;
        const ELEMHIDE = 1 << 8;
        const OTHER = 1 << 9;
        const BACKGROUND = 1 << 10;
        const XBL = 1 << 11;
        const PING = 1 << 12;
        const DTD = 1 << 13;
        const MEDIA = 1 << 14;
        const THIRD_PARTY = 1 << 15;
        const MATCH_CASE = 1 << 16;
        const COLLAPSE = 1 << 17;
        const DONOTTRACK = 1 << 18;
        const POPUP = 1 << 19;
        /// The `domain=` option
        const DOMAIN = 1 << 20;

        /// Every binary option
        const BINARY = (1 << 20) - 1;
    }
}

impl OptionMask {
    /// Map a filter-list option key (`domain` or a binary option name) to its bit.
    pub fn from_option_name(name: &str) -> Option<Self> {
        if name == "domain" {
            return Some(Self::DOMAIN);
        }
        BinaryOption::from_name(name).map(BinaryOption::mask)
    }

    /// Build a mask from option names, failing on the first unknown name.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownOption>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::empty(), |mask, name| {
            let name = name.as_ref();
            Self::from_option_name(name)
                .map(|bit| mask | bit)
                .ok_or_else(|| UnknownOption(name.to_string()))
        })
    }

    /// Names of every key in the mask, binary options first.
    pub fn names(self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = BinaryOption::ALL
            .iter()
            .filter(|opt| self.contains(opt.mask()))
            .map(|opt| opt.name())
            .collect();
        if self.contains(Self::DOMAIN) {
            names.push("domain");
        }
        names
    }
}

impl Default for OptionMask {
    fn default() -> Self {
        Self::all()
    }
}

// =============================================================================
// Binary Option Maps
// =============================================================================

/// Mapping from binary option to boolean, stored as a key mask and a value mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryOptions {
    keys: OptionMask,
    values: OptionMask,
}

impl BinaryOptions {
    pub const fn new() -> Self {
        Self {
            keys: OptionMask::empty(),
            values: OptionMask::empty(),
        }
    }

    /// Set `option` to `value`, replacing any earlier value.
    pub fn insert(&mut self, option: BinaryOption, value: bool) {
        let bit = option.mask();
        self.keys |= bit;
        self.values.set(bit, value);
    }

    pub fn get(&self, option: BinaryOption) -> Option<bool> {
        let bit = option.mask();
        self.keys.contains(bit).then(|| self.values.contains(bit))
    }

    pub fn contains(&self, option: BinaryOption) -> bool {
        self.keys.contains(option.mask())
    }

    /// Key set of this map.
    pub fn keys(&self) -> OptionMask {
        self.keys
    }

    /// Mask of keys whose value is `true`.
    pub fn values(&self) -> OptionMask {
        self.values
    }

    pub fn len(&self) -> usize {
        self.keys.bits().count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate entries in canonical option order.
    pub fn iter(&self) -> impl Iterator<Item = (BinaryOption, bool)> + '_ {
        BinaryOption::ALL
            .iter()
            .copied()
            .filter_map(move |opt| self.get(opt).map(|value| (opt, value)))
    }

    /// Keys within `mask` whose values differ between `self` and `other`.
    pub fn mismatched(&self, other: &BinaryOptions, mask: OptionMask) -> OptionMask {
        (self.values ^ other.values) & mask
    }
}

impl Default for BinaryOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(BinaryOption, bool)> for BinaryOptions {
    fn from_iter<I: IntoIterator<Item = (BinaryOption, bool)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (option, value) in iter {
            options.insert(option, value);
        }
        options
    }
}

// =============================================================================
// Rule Kinds
// =============================================================================

/// Classification of a filter-list line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `! comment` or `[Adblock Plus 2.0]` header
    Comment,
    /// `##` / `#@#` CSS hiding rule, never URL-matched
    ElementHiding,
    /// Network rule, blocking or exception
    Standard,
}

// =============================================================================
// Request Context
// =============================================================================

/// Context for a URL being matched.
///
/// Rules requiring a key the context does not supply are not applicable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext<'a> {
    /// Source (page) domain, lowercase
    pub domain: Option<&'a str>,
    /// Supplied binary option values
    pub options: BinaryOptions,
}

impl<'a> RequestContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: &'a str) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_option(mut self, option: BinaryOption, value: bool) -> Self {
        self.options.insert(option, value);
        self
    }

    /// Every supplied key, `DOMAIN` included when a domain is set.
    pub fn keys(&self) -> OptionMask {
        let mut keys = self.options.keys();
        if self.domain.is_some() {
            keys |= OptionMask::DOMAIN;
        }
        keys
    }
}

// =============================================================================
// Match Decision
// =============================================================================

/// Final decision for a matched URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// No blocking rule matched, or an exception rule matched
    Allow,
    /// A blocking rule matched and no exception did
    Block,
}
