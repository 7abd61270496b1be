//! Routes fetched pages to registered handlers
//!
//! Handlers are registered on a [`DispatcherBuilder`] and validated once in
//! [`DispatcherBuilder::build`]. Resolution order for a page:
//!
//! 1. HTTP code handler
//! 2. Type handler (or the null-type handler when the record has no type)
//! 3. First URL regex handler that fully matches, in registration order
//! 4. First regex rule set the URL satisfies, in registration order
//! 5. Default visit handler
//!
//! `before_visit` runs ahead of resolution and `after_parse` runs last, after
//! auto-parsed links were added.

use crate::crawler::parser::{HtmlLinkExtractor, LinkExtractor};
use crate::model::{CrawlDatums, Page};
use crate::url::{compile_full_match, RegexRule};
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Page handler; may push new records onto the batch
pub type Handler = Arc<dyn Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync>;

/// Which registration a page resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKind {
    Code(i32),
    Type(String),
    NullType,
    Url(String),
    /// Index of the regex rule set in registration order
    Rule(usize),
    Default,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "code {}", code),
            Self::Type(type_) => write!(f, "type {}", type_),
            Self::NullType => write!(f, "null type"),
            Self::Url(pattern) => write!(f, "url {}", pattern),
            Self::Rule(index) => write!(f, "rule set #{}", index),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Collects handler registrations; errors surface from `build`
#[derive(Default)]
pub struct DispatcherBuilder {
    code_handlers: HashMap<i32, Handler>,
    type_handlers: HashMap<String, Handler>,
    null_type_handler: Option<Handler>,
    url_handlers: Vec<(Regex, String, Handler)>,
    rule_handlers: Vec<(RegexRule, Handler)>,
    before_visit: Option<Handler>,
    after_parse: Option<Handler>,
    default_handler: Option<Handler>,
    auto_parse: bool,
    link_rule: RegexRule,
    link_extractor: Option<Arc<dyn LinkExtractor>>,
    errors: Vec<ConfigError>,
}

fn into_handler<H>(handler: H) -> Handler
where
    H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(handler)
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_once(&mut self, slot: SlotName, handler: Handler) {
        let target = match slot {
            SlotName::BeforeVisit => &mut self.before_visit,
            SlotName::AfterParse => &mut self.after_parse,
            SlotName::Visit => &mut self.default_handler,
            SlotName::NullType => &mut self.null_type_handler,
        };
        if target.is_some() {
            self.errors
                .push(ConfigError::DuplicateHandler(slot.to_string()));
        } else {
            *target = Some(handler);
        }
    }

    /// Handles pages whose HTTP code is one of `codes`
    pub fn match_code<H>(mut self, codes: &[i32], handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler = into_handler(handler);
        for &code in codes {
            if self.code_handlers.insert(code, Arc::clone(&handler)).is_some() {
                self.errors
                    .push(ConfigError::DuplicateHandler(format!("code {}", code)));
            }
        }
        self
    }

    /// Handles pages whose record type is one of `types`
    pub fn match_type<H>(mut self, types: &[&str], handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler = into_handler(handler);
        for type_ in types {
            if self
                .type_handlers
                .insert((*type_).to_string(), Arc::clone(&handler))
                .is_some()
            {
                self.errors
                    .push(ConfigError::DuplicateHandler(format!("type {}", type_)));
            }
        }
        self
    }

    /// Handles pages whose record has no type
    pub fn match_null_type<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_once(SlotName::NullType, into_handler(handler));
        self
    }

    /// Handles pages whose URL fully matches `pattern`
    pub fn match_url<H>(mut self, pattern: &str, handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match compile_full_match(pattern) {
            Ok(regex) => self
                .url_handlers
                .push((regex, pattern.to_string(), into_handler(handler))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Handles pages whose URL satisfies the `+`/`-` rule set
    pub fn match_url_regex_rule<H>(mut self, rules: &[&str], handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match RegexRule::from_rules(rules.iter().copied()) {
            Ok(rule) => self.rule_handlers.push((rule, into_handler(handler))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn before_visit<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_once(SlotName::BeforeVisit, into_handler(handler));
        self
    }

    pub fn after_parse<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_once(SlotName::AfterParse, into_handler(handler));
        self
    }

    /// Default handler for pages no other registration claims
    pub fn visit<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Page, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_once(SlotName::Visit, into_handler(handler));
        self
    }

    /// Adds outlinks satisfying the link rule from every HTML page
    pub fn auto_parse(mut self, enabled: bool) -> Self {
        self.auto_parse = enabled;
        self
    }

    pub fn link_rule(mut self, rule: RegexRule) -> Self {
        self.link_rule = rule;
        self
    }

    pub fn link_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.link_extractor = Some(extractor);
        self
    }

    /// Validates the registrations
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Every registration is valid and a default exists
    /// * `Err(ConfigError)` - The first registration error, or
    ///   `MissingDefaultHandler`
    pub fn build(mut self) -> ConfigResult<Dispatcher> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let default_handler = self
            .default_handler
            .ok_or(ConfigError::MissingDefaultHandler)?;

        Ok(Dispatcher {
            code_handlers: self.code_handlers,
            type_handlers: self.type_handlers,
            null_type_handler: self.null_type_handler,
            url_handlers: self.url_handlers,
            rule_handlers: self.rule_handlers,
            before_visit: self.before_visit,
            after_parse: self.after_parse,
            default_handler,
            auto_parse: self.auto_parse,
            link_rule: self.link_rule,
            link_extractor: self
                .link_extractor
                .unwrap_or_else(|| Arc::new(HtmlLinkExtractor::default())),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum SlotName {
    BeforeVisit,
    AfterParse,
    Visit,
    NullType,
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeVisit => "before_visit",
            Self::AfterParse => "after_parse",
            Self::Visit => "visit",
            Self::NullType => "null type",
        };
        f.write_str(name)
    }
}

/// Validated handler table
pub struct Dispatcher {
    code_handlers: HashMap<i32, Handler>,
    type_handlers: HashMap<String, Handler>,
    null_type_handler: Option<Handler>,
    url_handlers: Vec<(Regex, String, Handler)>,
    rule_handlers: Vec<(RegexRule, Handler)>,
    before_visit: Option<Handler>,
    after_parse: Option<Handler>,
    default_handler: Handler,
    auto_parse: bool,
    link_rule: RegexRule,
    link_extractor: Arc<dyn LinkExtractor>,
}

impl Dispatcher {
    /// Whether a code handler is registered for `code`
    pub fn handles_code(&self, code: i32) -> bool {
        self.code_handlers.contains_key(&code)
    }

    /// Picks the registration that would handle `page`
    pub fn resolve(&self, page: &Page) -> HandlerKind {
        self.resolve_handler(page).0
    }

    fn resolve_handler(&self, page: &Page) -> (HandlerKind, &Handler) {
        if let Some(handler) = self.code_handlers.get(&page.code) {
            return (HandlerKind::Code(page.code), handler);
        }

        match page.datum.type_() {
            Some(type_) => {
                if let Some(handler) = self.type_handlers.get(&type_) {
                    return (HandlerKind::Type(type_), handler);
                }
            }
            None => {
                if let Some(handler) = &self.null_type_handler {
                    return (HandlerKind::NullType, handler);
                }
            }
        }

        for (regex, pattern, handler) in &self.url_handlers {
            if regex.is_match(page.url()) {
                return (HandlerKind::Url(pattern.clone()), handler);
            }
        }

        for (index, (rule, handler)) in self.rule_handlers.iter().enumerate() {
            if rule.satisfy(page.url()) {
                return (HandlerKind::Rule(index), handler);
            }
        }

        (HandlerKind::Default, &self.default_handler)
    }

    /// Runs the hooks and the resolved handler for `page`
    pub fn dispatch(&self, page: &Page, next: &mut CrawlDatums) -> anyhow::Result<()> {
        if let Some(before) = &self.before_visit {
            before(page, next)?;
        }

        let (kind, handler) = self.resolve_handler(page);
        tracing::trace!("Dispatching {} to {} handler", page.url(), kind);
        handler(page, next)?;

        if self.auto_parse && !self.link_rule.is_empty() && page.is_html() {
            for link in self.link_extractor.extract(page) {
                if self.link_rule.satisfy(&link) {
                    next.add_url(link);
                }
            }
        }

        if let Some(after) = &self.after_parse {
            after(page, next)?;
        }
        Ok(())
    }
}
