//! Call-mapping classifier
//!
//! Statically analyzes wrapper-method bodies to determine which model-layer
//! operations they invoke, how wrapper parameters flow into those calls,
//! and which transformations (defaulting, coercion, identifier resolution,
//! writing-system substitution, null coalescing) are applied on the way.
//!
//! Matching runs over the [`crate::ast`] expression tree against a fixed
//! set of structural templates for the model layer's access idioms:
//! factory acquisition + creation call, repository bulk retrieval, direct
//! property read/write on a typed object, and multi-lingual string get/set
//! helpers. Classification is a deterministic function of the discovered
//! target-call set.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::ast::{BoolOpKind, Expr, Literal, MethodBody, Stmt};
use crate::catalog::Catalog;
use crate::parsing::parse_method_body;
use crate::schema::{Method, Origin, Param, RelationKind};

/// How a wrapper method relates to the model layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Exactly one target call, no extra logic
    Direct,
    /// Target call(s) plus defaulting/coercion/resolution logic
    Convenience,
    /// Multiple independent target calls forming one logical operation
    Composite,
    /// No target calls; purely local computation
    Pure,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Convenience => "convenience",
            Self::Composite => "composite",
            Self::Pure => "pure",
        }
    }
}

/// What kind of model-layer operation a target call is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    FactoryCreate,
    RepositoryAccess,
    PropertyRead,
    PropertyWrite,
    MultiStringGet,
    MultiStringSet,
    MethodCall,
}

/// One model-layer operation touched by a wrapper method
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetCall {
    /// Resolved model entity, when resolution succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Property involved (property access and multi-string idioms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    /// Member invoked (method name, or property name for plain access)
    pub member: String,

    pub kind: TargetKind,
}

impl TargetCall {
    /// Human-readable target, e.g. `ILexSense.Gloss.get_String`
    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if let Some(entity) = &self.entity {
            parts.push(entity.as_str());
        }
        if let Some(property) = &self.property {
            if property != &self.member {
                parts.push(property.as_str());
            }
        }
        parts.push(self.member.as_str());
        parts.join(".")
    }
}

/// Transformation applied between wrapper parameters and target calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    DefaultValue,
    IdentifierResolution,
    WsDefault,
    TypeCoercion,
    NullCoalesce,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DefaultValue => "default_value",
            Self::IdentifierResolution => "identifier_resolution",
            Self::WsDefault => "ws_default",
            Self::TypeCoercion => "type_coercion",
            Self::NullCoalesce => "null_coalesce",
        }
    }
}

/// A tagged transformation entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformKind,
    pub detail: String,
}

/// Classifier output for one wrapper method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// `Entity.method` of the wrapper layer
    pub source_method: String,

    pub classification: Classification,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_calls: Vec<TargetCall>,

    /// Wrapper parameter -> ordered "arg N of target" facts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub param_usage: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,

    /// Set when the method body could not be parsed at all
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unparsed: bool,
}

/// Coverage of mapping cross-references against the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub total_refs: usize,
    pub resolved_refs: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl CoverageReport {
    /// Fraction of target references that resolved (1.0 for an empty set)
    pub fn fraction(&self) -> f64 {
        if self.total_refs == 0 {
            1.0
        } else {
            self.resolved_refs as f64 / self.total_refs as f64
        }
    }
}

/// Repository bulk-retrieval members
const REPOSITORY_MEMBERS: &[&str] = &["AllInstances", "AllValidInstances", "GetObject", "Count"];

/// Primitive conversion callables
const COERCION_FNS: &[&str] = &["str", "int", "float", "bool", "unicode"];

/// Multi-string best-alternative accessors (read idiom without a call)
const BEST_ALTERNATIVE_ACCESSORS: &[&str] = &[
    "BestAnalysisAlternative",
    "BestVernacularAlternative",
    "BestAnalysisVernacularAlternative",
];

/// Plumbing attributes that never count as model property access
const PLUMBING_ATTRS: &[&str] = &["Text", "Length", "Hvo", "Guid", "ClassID", "ClassName"];

/// True for resolver-helper names ("resolve identifier to object" idiom)
fn is_resolver_name(name: &str) -> bool {
    name.starts_with("Resolve") || name.starts_with("Find") || name.ends_with("FromIdentifier")
}

/// True for system default writing-system accessors
fn is_default_ws_attr(attr: &str) -> bool {
    attr.starts_with("Default") && attr.ends_with("WritingSystem")
}

/// Build mappings for every wrapper method that carries a source body.
///
/// Classification per method is independent, so the scan runs through a
/// parallel iterator; the result map is keyed and therefore deterministic
/// regardless of scheduling.
pub fn build_mappings(catalog: &Catalog) -> BTreeMap<String, Mapping> {
    let methods: Vec<(&str, &Method)> = catalog
        .entities_of(Origin::Wrapper)
        .flat_map(|e| {
            e.methods
                .iter()
                .filter(|m| m.source.is_some())
                .map(move |m| (e.id.as_str(), m))
        })
        .collect();

    let mappings: BTreeMap<String, Mapping> = methods
        .par_iter()
        .map(|(entity_id, method)| {
            let mapping = classify_method(entity_id, method, catalog);
            (mapping.source_method.clone(), mapping)
        })
        .collect();

    info!(mappings = mappings.len(), "mapping classification complete");
    mappings
}

/// Classify one wrapper method body into a [`Mapping`]
pub fn classify_method(entity_id: &str, method: &Method, catalog: &Catalog) -> Mapping {
    let source_method = format!("{}.{}", entity_id, method.name);

    let Some(body) = method.source.as_deref().and_then(parse_method_body) else {
        debug!(method = %source_method, "unparsed method body");
        return Mapping {
            source_method,
            classification: Classification::Pure,
            target_calls: Vec::new(),
            param_usage: BTreeMap::new(),
            transformations: Vec::new(),
            unparsed: true,
        };
    };

    let mut scanner = Scanner::new(catalog, &method.params);
    scanner.scan_body(&body);

    // Declared non-None default literals are transformations by themselves;
    // `None` marks an absent optional and is covered by ws_default et al.
    for param in &method.params {
        if let Some(default) = &param.default {
            if default != "None" {
                scanner.add_transform(
                    TransformKind::DefaultValue,
                    format!("{} = {}", param.name, default),
                );
            }
        }
    }

    let targets = scanner.targets;
    let transformations: Vec<Transformation> = scanner.transforms.into_iter().collect();

    let classification = if targets.is_empty() {
        Classification::Pure
    } else if targets.len() == 1 && transformations.is_empty() {
        Classification::Direct
    } else if targets.len() > 1 {
        Classification::Composite
    } else {
        Classification::Convenience
    };

    Mapping {
        source_method,
        classification,
        target_calls: targets,
        param_usage: scanner.param_usage,
        transformations,
        unparsed: false,
    }
}

/// Resolve every target reference against the catalog and aggregate the
/// result into a [`CoverageReport`]. Unresolved references are reported,
/// never fatal.
pub fn validate_mappings(
    mappings: &BTreeMap<String, Mapping>,
    catalog: &Catalog,
) -> CoverageReport {
    let mut report = CoverageReport::default();
    let mut unresolved = BTreeSet::new();

    for mapping in mappings.values() {
        for target in &mapping.target_calls {
            report.total_refs += 1;
            if target_resolves(target, catalog) {
                report.resolved_refs += 1;
            } else {
                unresolved.insert(target.display());
            }
        }
    }

    report.unresolved = unresolved.into_iter().collect();
    info!(
        total = report.total_refs,
        resolved = report.resolved_refs,
        "cross-reference validation complete"
    );
    report
}

fn target_resolves(target: &TargetCall, catalog: &Catalog) -> bool {
    let Some(entity_id) = &target.entity else {
        return false;
    };
    let Some(entity) = catalog.entity(entity_id) else {
        return false;
    };

    match target.kind {
        TargetKind::PropertyRead | TargetKind::PropertyWrite => {
            entity.property(&target.member).is_some()
        }
        TargetKind::MultiStringGet | TargetKind::MultiStringSet => target
            .property
            .as_deref()
            .is_some_and(|p| entity.property(p).is_some()),
        TargetKind::MethodCall => entity.method(&target.member).is_some(),
        // Factories and repositories resolve at the entity level; their
        // creation/retrieval members are generated, not declared
        TargetKind::FactoryCreate | TargetKind::RepositoryAccess => true,
    }
}

/// Single-pass template matcher over one method body
struct Scanner<'a> {
    catalog: &'a Catalog,
    params: Vec<&'a str>,
    targets: Vec<TargetCall>,
    transforms: BTreeSet<Transformation>,
    param_usage: BTreeMap<String, Vec<String>>,
    /// Locals assigned from a call or property read, for coalesce tracking
    call_locals: BTreeSet<String>,
}

impl<'a> Scanner<'a> {
    fn new(catalog: &'a Catalog, params: &'a [Param]) -> Self {
        Self {
            catalog,
            params: params.iter().map(|p| p.name.as_str()).collect(),
            targets: Vec::new(),
            transforms: BTreeSet::new(),
            param_usage: BTreeMap::new(),
            call_locals: BTreeSet::new(),
        }
    }

    fn scan_body(&mut self, body: &MethodBody) {
        self.scan_stmts(&body.stmts);
    }

    fn scan_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.scan_stmt(stmt);
        }
    }

    fn scan_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.scan_expr(e),
            Stmt::Assign { target, value } => {
                match target {
                    // Attribute targets are property writes
                    Expr::Attribute { object, attr } => {
                        if self.is_model_property(attr) {
                            let entity = self.property_owner_of(attr);
                            let write = TargetCall {
                                entity,
                                property: Some(attr.clone()),
                                member: attr.clone(),
                                kind: TargetKind::PropertyWrite,
                            };
                            let display = write.display();
                            self.add_target(write);
                            if let Some(param) = self.param_in(value) {
                                self.param_usage
                                    .entry(param)
                                    .or_default()
                                    .push(format!("arg 1 of {}", display));
                            }
                        }
                        self.scan_expr(object);
                    }
                    Expr::Name(name) => {
                        if matches!(value, Expr::Call { .. } | Expr::Attribute { .. }) {
                            self.call_locals.insert(name.clone());
                        }
                    }
                    _ => {}
                }
                self.scan_expr(value);
            }
            Stmt::If {
                test,
                then_body,
                else_body,
            } => {
                self.detect_ws_default_branch(test, then_body, else_body);
                self.scan_expr(test);
                self.scan_stmts(then_body);
                self.scan_stmts(else_body);
            }
            Stmt::For { iter, body, .. } => {
                self.scan_expr(iter);
                self.scan_stmts(body);
            }
            Stmt::Return(Some(e)) => self.scan_expr(e),
            Stmt::Return(None) => {}
            Stmt::Try { body, handler_body } => {
                self.scan_stmts(body);
                self.scan_stmts(handler_body);
            }
            Stmt::Unknown => {}
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                let consumed_property_object = self.match_call(callee, args, kwargs);
                for arg in args {
                    self.scan_expr(arg);
                }
                for (_, value) in kwargs {
                    self.scan_expr(value);
                }
                // Recurse past the member segment; a consumed multi-string
                // property skips one more attribute hop
                match &**callee {
                    Expr::Attribute { object, .. } => {
                        if consumed_property_object {
                            if let Expr::Attribute { object: inner, .. } = &**object {
                                self.scan_expr(inner);
                            } else {
                                self.scan_expr(object);
                            }
                        } else {
                            self.scan_expr(object);
                        }
                    }
                    other => self.scan_expr(other),
                }
            }
            Expr::Attribute { object, attr } => {
                // Best-alternative accessors read the multi-string property
                // underneath them without an explicit call
                if BEST_ALTERNATIVE_ACCESSORS.contains(&attr.as_str()) {
                    if let Expr::Attribute {
                        object: inner,
                        attr: property,
                    } = &**object
                    {
                        if self.is_model_property(property) {
                            let entity = self.property_owner_of(property);
                            self.add_target(TargetCall {
                                entity,
                                property: Some(property.clone()),
                                member: attr.clone(),
                                kind: TargetKind::MultiStringGet,
                            });
                            self.scan_expr(inner);
                            return;
                        }
                    }
                }

                if self.is_model_property(attr) {
                    let entity = self.property_owner_of(attr);
                    self.add_target(TargetCall {
                        entity,
                        property: Some(attr.clone()),
                        member: attr.clone(),
                        kind: TargetKind::PropertyRead,
                    });
                }
                self.scan_expr(object);
            }
            Expr::BoolOp { op, left, right } => {
                if *op == BoolOpKind::Or {
                    self.detect_null_coalesce(left, right);
                    self.detect_ws_default_or(left, right);
                }
                self.scan_expr(left);
                self.scan_expr(right);
            }
            Expr::Not(inner) => self.scan_expr(inner),
            Expr::Subscript { object, index } => {
                self.scan_expr(object);
                self.scan_expr(index);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if matches!(&**otherwise, Expr::Literal(Literal::Str(s)) if s.is_empty()) {
                    self.add_transform(TransformKind::NullCoalesce, "else \"\"".to_string());
                }
                self.scan_expr(test);
                self.scan_expr(then);
                self.scan_expr(otherwise);
            }
            Expr::Compare { left, right, .. } => {
                self.scan_expr(left);
                self.scan_expr(right);
            }
            Expr::Name(_) | Expr::Literal(_) | Expr::Unknown => {}
        }
    }

    /// Match one call expression against the access-idiom templates.
    /// Returns true when the callee's immediate attribute object was
    /// consumed as a multi-string property.
    fn match_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> bool {
        match callee {
            Expr::Name(name) => {
                if COERCION_FNS.contains(&name.as_str()) && args.len() == 1 {
                    self.add_transform(TransformKind::TypeCoercion, name.clone());
                } else if is_resolver_name(name) {
                    self.add_transform(TransformKind::IdentifierResolution, name.clone());
                }
                false
            }
            Expr::Attribute { object, attr } => {
                let member = attr.as_str();

                // Template: multi-lingual string get/set helper
                if member == "get_String" || member == "set_String" {
                    let kind = if member == "get_String" {
                        TargetKind::MultiStringGet
                    } else {
                        TargetKind::MultiStringSet
                    };
                    let property = object.attr_name().map(str::to_string);
                    let entity = property
                        .as_deref()
                        .and_then(|p| self.property_owner_of(p));
                    let target = TargetCall {
                        entity,
                        property: property.clone(),
                        member: member.to_string(),
                        kind,
                    };
                    let display = target.display();
                    self.add_target(target);
                    self.record_arg_usage(&display, args, kwargs);
                    return property.is_some();
                }

                // Template: factory acquisition followed by a creation call
                if member.starts_with("Create") {
                    if let Some(factory) = self.locator_segment(object, "Factory") {
                        let target = TargetCall {
                            entity: Some(factory),
                            property: None,
                            member: member.to_string(),
                            kind: TargetKind::FactoryCreate,
                        };
                        let display = target.display();
                        self.add_target(target);
                        self.record_arg_usage(&display, args, kwargs);
                        return false;
                    }
                }

                // Template: repository/collection bulk retrieval
                if REPOSITORY_MEMBERS.contains(&member) {
                    if let Some(repo) = self.locator_segment(object, "Repository") {
                        let target = TargetCall {
                            entity: Some(repo),
                            property: None,
                            member: member.to_string(),
                            kind: TargetKind::RepositoryAccess,
                        };
                        let display = target.display();
                        self.add_target(target);
                        self.record_arg_usage(&display, args, kwargs);
                        return false;
                    }
                }

                if is_resolver_name(member) {
                    self.add_transform(TransformKind::IdentifierResolution, member.to_string());
                    return false;
                }

                // Template: direct model method call resolved via catalog
                if let Some(owner) = self.method_owner_of(member) {
                    let target = TargetCall {
                        entity: Some(owner),
                        property: None,
                        member: member.to_string(),
                        kind: TargetKind::MethodCall,
                    };
                    let display = target.display();
                    self.add_target(target);
                    self.record_arg_usage(&display, args, kwargs);
                }
                false
            }
            _ => false,
        }
    }

    /// Search for a `*Factory`/`*Repository` name either in the attribute
    /// chain of `object` or as the argument of a `GetInstance` acquisition
    fn locator_segment(&self, object: &Expr, suffix: &str) -> Option<String> {
        for segment in object.attribute_chain() {
            if segment.ends_with(suffix) {
                return Some(segment.to_string());
            }
        }

        // Acquisition form: ServiceLocator.GetInstance(ILexSenseFactory)
        if let Expr::Call { callee, args, .. } = object {
            let is_get_instance = matches!(
                &**callee,
                Expr::Attribute { attr, .. } if attr == "GetInstance"
            ) || matches!(&**callee, Expr::Name(n) if n == "GetInstance");
            if is_get_instance {
                for arg in args {
                    let name = match arg {
                        Expr::Name(n) => Some(n.as_str()),
                        Expr::Attribute { attr, .. } => Some(attr.as_str()),
                        _ => None,
                    };
                    if let Some(name) = name {
                        if name.ends_with(suffix) {
                            return Some(name.to_string());
                        }
                    }
                }
            }
        }
        None
    }

    /// Record "arg N of target" facts for wrapper params flowing into a call
    fn record_arg_usage(&mut self, display: &str, args: &[Expr], kwargs: &[(String, Expr)]) {
        for (i, arg) in args.iter().enumerate() {
            if let Some(param) = self.param_in(arg) {
                let fact = format!("arg {} of {}", i + 1, display);
                self.param_usage.entry(param).or_default().push(fact);
            }
        }
        for (name, value) in kwargs {
            if let Some(param) = self.param_in(value) {
                let fact = format!("kwarg {} of {}", name, display);
                self.param_usage.entry(param).or_default().push(fact);
            }
        }
    }

    /// A wrapper parameter supplying this argument, seen through coercion
    /// wrappers and or-fallbacks
    fn param_in(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Name(n) if self.params.contains(&n.as_str()) => Some(n.clone()),
            Expr::Call { callee, args, .. } => {
                if matches!(&**callee, Expr::Name(n) if COERCION_FNS.contains(&n.as_str())) {
                    args.first().and_then(|a| self.param_in(a))
                } else {
                    None
                }
            }
            Expr::BoolOp { left, .. } => self.param_in(left),
            _ => None,
        }
    }

    fn detect_null_coalesce(&mut self, left: &Expr, right: &Expr) {
        let empty_fallback = matches!(right, Expr::Literal(Literal::Str(s)) if s.is_empty())
            || matches!(right, Expr::Literal(Literal::None));
        let wraps_result = match left {
            Expr::Call { .. } | Expr::Attribute { .. } => true,
            Expr::Name(n) => self.call_locals.contains(n),
            _ => false,
        };
        if empty_fallback && wraps_result {
            self.add_transform(TransformKind::NullCoalesce, "or \"\"".to_string());
        }
    }

    /// `ws = ws or project.DefaultAnalysisWritingSystem` form
    fn detect_ws_default_or(&mut self, left: &Expr, right: &Expr) {
        if let Expr::Name(param) = left {
            if self.params.contains(&param.as_str()) && expr_has_default_ws(right) {
                self.add_transform(TransformKind::WsDefault, param.clone());
            }
        }
    }

    /// `if ws is None: ws = project.DefaultAnalysisWritingSystem` form
    fn detect_ws_default_branch(&mut self, test: &Expr, then_body: &[Stmt], else_body: &[Stmt]) {
        let mentioned: Vec<String> = self
            .params
            .iter()
            .filter(|p| test.mentions_name(p))
            .map(|p| p.to_string())
            .collect();
        if mentioned.is_empty() {
            return;
        }
        if stmts_have_default_ws(then_body) || stmts_have_default_ws(else_body) {
            for param in mentioned {
                self.add_transform(TransformKind::WsDefault, param);
            }
        }
    }

    /// A model property is one the catalog declares, or one following the
    /// relationship-suffix convention; default writing-system accessors and
    /// plumbing attributes never qualify.
    fn is_model_property(&self, attr: &str) -> bool {
        if is_default_ws_attr(attr) || PLUMBING_ATTRS.contains(&attr) {
            return false;
        }
        !self.catalog.property_owners(attr).is_empty() || RelationKind::from_suffix(attr).is_some()
    }

    fn property_owner_of(&self, attr: &str) -> Option<String> {
        self.catalog
            .property_owners(attr)
            .first()
            .map(|e| e.id.clone())
    }

    fn method_owner_of(&self, member: &str) -> Option<String> {
        self.catalog
            .method_owners(member)
            .first()
            .map(|e| e.id.clone())
    }

    /// Append a target, deduplicating exact repeats while preserving order
    fn add_target(&mut self, target: TargetCall) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    fn add_transform(&mut self, kind: TransformKind, detail: String) {
        self.transforms.insert(Transformation { kind, detail });
    }
}

fn expr_has_default_ws(expr: &Expr) -> bool {
    let mut found = false;
    crate::ast::walk_expr(expr, &mut |e| {
        if let Expr::Attribute { attr, .. } = e {
            if is_default_ws_attr(attr) {
                found = true;
            }
        }
    });
    found
}

fn stmts_have_default_ws(stmts: &[Stmt]) -> bool {
    let mut found = false;
    crate::ast::walk_stmts(stmts, &mut |e| {
        if let Expr::Attribute { attr, .. } = e {
            if is_default_ws_attr(attr) {
                found = true;
            }
        }
    });
    found
}
