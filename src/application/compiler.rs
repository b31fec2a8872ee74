use crate::application::validate::{
    DobInput, StateTable, validate_category_code, validate_dob, validate_percent, validate_url,
};
use crate::domain::entity::{self, EntityKind, OWNER_FLAG_KEY, SegmentRoute};
use crate::domain::ports::NestedPayload;
use crate::domain::requirement::{FieldPath, FieldRequirement, FlatSubmission, Urgency};
use crate::error::{OnboardingError, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Exemption and lookup policy for one compile run.
///
/// The exemption classes of the compiler itself (role booleans, secondary
/// address lines, tos acceptance, person placeholders) are built in; this
/// carries the per-run knobs.
#[derive(Debug, Clone, Default)]
pub struct CompilePolicy {
    /// Exact dotted paths to skip without error.
    pub exempt: HashSet<String>,
    /// When false, verification document paths are not collected this cycle.
    pub document_upload_required: bool,
    /// The entity's home country, used for state validation when no sibling
    /// country field was submitted.
    pub country: Option<String>,
    pub states: StateTable,
    pub category_codes: HashSet<String>,
}

/// Compiles a provider-declared requirements list plus a flat submission into
/// the nested payload the remote API expects.
///
/// One compiler handles every entity family; `EntityKind` parameterizes flat
/// key resolution and the person role flag instead of duplicating the compile
/// loop per entity type.
pub struct RequirementsCompiler {
    kind: EntityKind,
    policy: CompilePolicy,
}

impl RequirementsCompiler {
    pub fn new(kind: EntityKind, policy: CompilePolicy) -> Self {
        Self { kind, policy }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Builds the nested payload. Fails with `MissingField` on the first
    /// currently-due path that has no submitted value and no exemption.
    /// Identical inputs always produce an identical payload.
    pub fn compile(
        &self,
        requirements: &[FieldRequirement],
        submission: &FlatSubmission,
    ) -> Result<NestedPayload> {
        let mut payload = NestedPayload::new();
        let mut compiled_dobs: HashSet<String> = HashSet::new();

        for requirement in requirements {
            self.compile_one(requirement, submission, &mut payload, &mut compiled_dobs)?;
        }

        if let Some(role) = self.kind.relationship_role() {
            insert_path(
                &mut payload,
                &["relationship".to_owned(), role.to_owned()],
                Value::Bool(true),
            );
        }

        Ok(payload)
    }

    fn compile_one(
        &self,
        requirement: &FieldRequirement,
        submission: &FlatSubmission,
        payload: &mut NestedPayload,
        compiled_dobs: &mut HashSet<String>,
    ) -> Result<()> {
        let path = &requirement.path;
        let route = entity::route(path.head());
        let display = path.to_string();

        if route == SegmentRoute::Exempt || self.policy.exempt.contains(&display) {
            return Ok(());
        }
        if entity::is_secondary_address_line(path.last()) {
            return Ok(());
        }
        if route == SegmentRoute::Relationship && entity::is_role_boolean(path.last()) {
            return Ok(());
        }

        if is_dob_member(path) {
            return self.compile_dob(requirement, route, submission, payload, compiled_dobs);
        }
        if is_document_path(path) {
            return self.compile_document(requirement, route, submission, payload);
        }
        if route == SegmentRoute::Dedicated("business_profile")
            && matches!(path.last(), "url" | "product_description")
        {
            return self.compile_business_profile_pair(requirement, submission, payload);
        }

        let flat = flat_key(path, route);
        let Some(raw) = submission.text(&flat) else {
            return self.unsupplied(requirement);
        };

        match path.last() {
            "state" => {
                let country_key = sibling_key(&flat, "country");
                let country = submission
                    .text(&country_key)
                    .or(self.policy.country.as_deref());
                self.policy.states.validate(&display, country, raw)?;
            }
            "mcc" => validate_category_code(&display, raw, &self.policy.category_codes)?,
            "url" => validate_url(&display, raw)?,
            "percent_ownership" => {
                let owner_flag = submission.text(OWNER_FLAG_KEY) == Some("true");
                match validate_percent(&display, raw, owner_flag)? {
                    Some(value) => {
                        insert_path(payload, path.segments(), Value::String(value));
                        return Ok(());
                    }
                    // a permitted zero share is omitted entirely
                    None => return Ok(()),
                }
            }
            _ => {}
        }

        insert_path(payload, path.segments(), Value::String(raw.to_owned()));
        Ok(())
    }

    /// Day/month/year triads are compiled once per base path. The triad is
    /// all-or-nothing on the submission side: one supplied part makes the
    /// other two required even if the provider never listed them.
    fn compile_dob(
        &self,
        requirement: &FieldRequirement,
        route: SegmentRoute,
        submission: &FlatSubmission,
        payload: &mut NestedPayload,
        compiled_dobs: &mut HashSet<String>,
    ) -> Result<()> {
        let path = &requirement.path;
        let base_segments = &path.segments()[..path.segments().len() - 1];
        let base_display = base_segments.join(".");
        if compiled_dobs.contains(&base_display) {
            return Ok(());
        }

        let flat = flat_key(path, route);
        let flat_base = flat
            .strip_suffix(path.last())
            .and_then(|prefix| prefix.strip_suffix('_'))
            .unwrap_or("dob")
            .to_owned();
        let input = DobInput {
            day: submission.text(&format!("{flat_base}_day")),
            month: submission.text(&format!("{flat_base}_month")),
            year: submission.text(&format!("{flat_base}_year")),
        };

        if input.is_empty() {
            return self.unsupplied(requirement);
        }

        let dob = validate_dob(&base_display, input)?;
        for (leaf, value) in [("day", dob.day), ("month", dob.month), ("year", dob.year)] {
            let mut segments = base_segments.to_vec();
            segments.push(leaf.to_owned());
            insert_path(payload, &segments, Value::String(value));
        }

        compiled_dobs.insert(base_display);
        Ok(())
    }

    /// Document references arrive as provider file ids, resolved by uploading
    /// ahead of compilation. When no upload was required this cycle the path
    /// is skipped regardless of urgency.
    fn compile_document(
        &self,
        requirement: &FieldRequirement,
        route: SegmentRoute,
        submission: &FlatSubmission,
        payload: &mut NestedPayload,
    ) -> Result<()> {
        let flat = flat_key(&requirement.path, route);
        match submission.text(&flat) {
            Some(file_id) => {
                insert_path(
                    payload,
                    requirement.path.segments(),
                    Value::String(file_id.to_owned()),
                );
                Ok(())
            }
            None if !self.policy.document_upload_required => Ok(()),
            None => self.unsupplied(requirement),
        }
    }

    /// The business profile URL and product description form an either/or
    /// pair: a supplied URL satisfies a required description, but a
    /// description alone never satisfies a required URL; it upgrades the
    /// failure to a specific missing-URL error instead.
    fn compile_business_profile_pair(
        &self,
        requirement: &FieldRequirement,
        submission: &FlatSubmission,
        payload: &mut NestedPayload,
    ) -> Result<()> {
        let path = &requirement.path;
        let display = path.to_string();
        let url = submission.text("business_profile_url");
        let description = submission.text("business_profile_product_description");

        match path.last() {
            "url" => match url {
                Some(raw) => {
                    validate_url(&display, raw)?;
                    insert_path(payload, path.segments(), Value::String(raw.to_owned()));
                    Ok(())
                }
                None if description.is_some() => Err(OnboardingError::validation(
                    display,
                    "a business URL is required when a product description is provided",
                )),
                None => self.unsupplied(requirement),
            },
            _ => match description {
                Some(raw) => {
                    insert_path(payload, path.segments(), Value::String(raw.to_owned()));
                    Ok(())
                }
                // the sibling URL satisfies the pair
                None if url.is_some() => Ok(()),
                None => self.unsupplied(requirement),
            },
        }
    }

    fn unsupplied(&self, requirement: &FieldRequirement) -> Result<()> {
        match requirement.urgency {
            Urgency::CurrentlyDue => Err(OnboardingError::missing(requirement.path.to_string())),
            Urgency::EventuallyDue => Ok(()),
        }
    }
}

fn is_dob_member(path: &FieldPath) -> bool {
    let segments = path.segments();
    segments.len() >= 2
        && segments[segments.len() - 2] == "dob"
        && matches!(path.last(), "day" | "month" | "year")
}

fn is_document_path(path: &FieldPath) -> bool {
    path.segments().iter().any(|segment| segment == "verification")
}

/// Resolves the flat submission key for a path. Entity-prefixed paths are
/// looked up with the prefix stripped; every other path joins all segments.
fn flat_key(path: &FieldPath, route: SegmentRoute) -> String {
    match route {
        SegmentRoute::Entity(_) => path.flat_key(),
        _ => path.full_flat_key(),
    }
}

/// The flat key of a sibling leaf, e.g. `address_state` → `address_country`.
fn sibling_key(flat: &str, leaf: &str) -> String {
    match flat.rsplit_once('_') {
        Some((prefix, _)) => format!("{prefix}_{leaf}"),
        None => leaf.to_owned(),
    }
}

fn insert_path(payload: &mut NestedPayload, segments: &[String], value: Value) {
    let Some((leaf, branches)) = segments.split_last() else {
        return;
    };
    let mut current = payload;
    for segment in branches {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            unreachable!()
        };
        current = next;
    }
    current.insert(leaf.clone(), value);
}
