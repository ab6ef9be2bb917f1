use std::collections::{BTreeMap, HashSet};

use crate::firestore::error::{
    invalid_argument, malformed_path, precondition_conflict, sentinel_misuse, FirestoreResult,
};
use crate::firestore::model::{
    DocumentKey, FieldPath, FieldTransform, IntoFieldPath, Precondition, TransformOperation, Write,
    WriteOperation,
};
use crate::firestore::value::{FirestoreValue, MapValue, SentinelValue, ValueKind};

/// Options that configure the behaviour of `set` writes.
///
/// `merge` writes every leaf present in the data; `merge_fields` restricts the
/// write to the listed paths and takes precedence over `merge`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetOptions {
    pub merge: bool,
    pub merge_fields: Option<Vec<FieldPath>>,
}

impl SetOptions {
    /// Builds set options that merge every field present in the provided data.
    pub fn merge_all() -> Self {
        Self {
            merge: true,
            merge_fields: None,
        }
    }

    /// Builds set options that merge only the specified field paths.
    ///
    /// Accepts [`FieldPath`]s or dotted strings. Repeated paths collapse into one entry.
    pub fn merge_fields<I>(fields: I) -> FirestoreResult<Self>
    where
        I: IntoIterator,
        I::Item: IntoFieldPath,
    {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for field in fields {
            let field = field.into_field_path()?;
            if seen.insert(field.clone()) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(invalid_argument(
                "merge_fields requires at least one field path",
            ));
        }
        Ok(Self {
            merge: false,
            merge_fields: Some(unique),
        })
    }

    pub fn is_merge(&self) -> bool {
        self.merge || self.merge_fields.is_some()
    }

    pub fn field_mask(&self) -> Option<&[FieldPath]> {
        self.merge_fields.as_deref()
    }
}

/// What a mutation does with its input data.
///
/// `Create` and `Set` keys are literal field names at every depth. `Update` splits
/// its top-level keys on dots; `UpdatePaths` takes structured paths as given.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationKind {
    Create(BTreeMap<String, FirestoreValue>),
    Set {
        data: BTreeMap<String, FirestoreValue>,
        options: SetOptions,
    },
    Update(BTreeMap<String, FirestoreValue>),
    UpdatePaths(Vec<(FieldPath, FirestoreValue)>),
    Delete,
}

/// A single document mutation as requested by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    key: DocumentKey,
    kind: MutationKind,
    precondition: Option<Precondition>,
}

impl Mutation {
    pub fn new(key: DocumentKey, kind: MutationKind) -> Self {
        Self {
            key,
            kind,
            precondition: None,
        }
    }

    pub fn create(key: DocumentKey, data: BTreeMap<String, FirestoreValue>) -> Self {
        Self::new(key, MutationKind::Create(data))
    }

    pub fn set(key: DocumentKey, data: BTreeMap<String, FirestoreValue>, options: SetOptions) -> Self {
        Self::new(key, MutationKind::Set { data, options })
    }

    pub fn update(key: DocumentKey, data: BTreeMap<String, FirestoreValue>) -> Self {
        Self::new(key, MutationKind::Update(data))
    }

    pub fn update_paths(key: DocumentKey, updates: Vec<(FieldPath, FirestoreValue)>) -> Self {
        Self::new(key, MutationKind::UpdatePaths(updates))
    }

    pub fn delete(key: DocumentKey) -> Self {
        Self::new(key, MutationKind::Delete)
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn precondition(&self) -> Option<&Precondition> {
        self.precondition.as_ref()
    }

    pub fn resolve(&self) -> FirestoreResult<Vec<Write>> {
        resolve_mutation(self)
    }
}

/// Translates a mutation into the writes sent to the backend.
///
/// The result holds at most an update write followed by a transform write; the
/// precondition is attached to the first of them. Nothing is produced when any
/// validation fails.
pub fn resolve_mutation(mutation: &Mutation) -> FirestoreResult<Vec<Write>> {
    match &mutation.kind {
        MutationKind::Create(data) => resolve_create(mutation, data),
        MutationKind::Set { data, options } => resolve_set(mutation, data, options),
        MutationKind::Update(data) => {
            let updates = data
                .iter()
                .map(|(key, value)| -> FirestoreResult<_> {
                    Ok((FieldPath::from_dot_separated(key)?, value.clone()))
                })
                .collect::<FirestoreResult<Vec<_>>>()?;
            resolve_update(mutation, &updates)
        }
        MutationKind::UpdatePaths(updates) => resolve_update(mutation, updates),
        MutationKind::Delete => Ok(vec![Write::new(
            WriteOperation::Delete {
                key: mutation.key.clone(),
            },
            mutation.precondition.clone(),
        )]),
    }
}

fn resolve_create(
    mutation: &Mutation,
    data: &BTreeMap<String, FirestoreValue>,
) -> FirestoreResult<Vec<Write>> {
    if mutation.precondition.is_some() {
        return Err(precondition_conflict(
            "create already implies that the document must not exist",
        ));
    }

    let mut extracted = ExtractedSentinels::default();
    let fields = extract_map(data, None, &mut extracted)?;
    if let Some(path) = extracted.deletes.first() {
        return Err(sentinel_misuse(format!(
            "Delete cannot be used in create (field '{path}')"
        )));
    }

    let emit_update = !(fields.is_empty() && !extracted.transforms.is_empty());
    Ok(assemble_writes(
        &mutation.key,
        emit_update.then(|| (fields, None)),
        extracted.transforms,
        Some(Precondition::Exists(false)),
    ))
}

fn resolve_set(
    mutation: &Mutation,
    data: &BTreeMap<String, FirestoreValue>,
    options: &SetOptions,
) -> FirestoreResult<Vec<Write>> {
    if mutation.precondition.is_some() {
        return Err(precondition_conflict("set does not accept a precondition"));
    }

    let mut extracted = ExtractedSentinels::default();
    let fields = extract_map(data, None, &mut extracted)?;

    if let Some(merge_fields) = options.field_mask() {
        return resolve_set_merge_fields(mutation, data, fields, extracted, merge_fields);
    }

    if options.merge {
        let mut mask = collect_leaf_paths(&fields, None)?;
        mask.extend(extracted.deletes);
        mask.sort();
        let emit_update = !(mask.is_empty() && !extracted.transforms.is_empty());
        return Ok(assemble_writes(
            &mutation.key,
            emit_update.then(|| (fields, Some(mask))),
            extracted.transforms,
            None,
        ));
    }

    if let Some(path) = extracted.deletes.first() {
        return Err(sentinel_misuse(format!(
            "Delete cannot be used in set without merge (field '{path}')"
        )));
    }
    Ok(assemble_writes(
        &mutation.key,
        Some((fields, None)),
        extracted.transforms,
        None,
    ))
}

fn resolve_set_merge_fields(
    mutation: &Mutation,
    data: &BTreeMap<String, FirestoreValue>,
    fields: BTreeMap<String, FirestoreValue>,
    extracted: ExtractedSentinels,
    merge_fields: &[FieldPath],
) -> FirestoreResult<Vec<Write>> {
    let mut merge_paths = merge_fields.to_vec();
    merge_paths.sort();
    for pair in merge_paths.windows(2) {
        if pair[0].is_prefix_of(&pair[1]) {
            return Err(malformed_path(format!(
                "Merge field '{}' overlaps merge field '{}'",
                pair[0], pair[1]
            )));
        }
    }

    let mut mask = Vec::new();
    let mut output = BTreeMap::new();
    for path in &merge_paths {
        let value = value_at_path(data, path).ok_or_else(|| {
            malformed_path(format!("Merge field '{path}' is not present in the data"))
        })?;
        if value.sentinel().is_some_and(SentinelValue::is_transform) {
            continue;
        }
        mask.push(path.clone());
        if let Some(cleaned) = value_at_path(&fields, path) {
            set_value_at_field_path(&mut output, path, cleaned.clone());
        }
    }

    if let Some(path) = extracted
        .deletes
        .iter()
        .find(|delete| !merge_paths.contains(*delete))
    {
        return Err(sentinel_misuse(format!(
            "Delete at '{path}' must be the value of a merge field"
        )));
    }

    let transforms: Vec<FieldTransform> = extracted
        .transforms
        .into_iter()
        .filter(|transform| {
            merge_paths
                .iter()
                .any(|path| path.is_prefix_of(transform.field_path()))
        })
        .collect();

    let emit_update = !(mask.is_empty() && !transforms.is_empty());
    Ok(assemble_writes(
        &mutation.key,
        emit_update.then(|| (output, Some(mask))),
        transforms,
        None,
    ))
}

fn resolve_update(
    mutation: &Mutation,
    updates: &[(FieldPath, FirestoreValue)],
) -> FirestoreResult<Vec<Write>> {
    if updates.is_empty() {
        return Err(malformed_path("update requires at least one field path"));
    }

    let precondition = match &mutation.precondition {
        None => Precondition::Exists(true),
        Some(Precondition::Exists(_)) => {
            return Err(precondition_conflict(
                "update already implies that the document must exist",
            ))
        }
        Some(precondition) => precondition.clone(),
    };

    let mut paths: Vec<&FieldPath> = updates.iter().map(|(path, _)| path).collect();
    paths.sort();
    for pair in paths.windows(2) {
        if pair[0] == pair[1] {
            return Err(malformed_path(format!("Field '{}' is updated twice", pair[0])));
        }
        if pair[0].is_prefix_of(pair[1]) {
            return Err(malformed_path(format!(
                "Field '{}' is a prefix of field '{}'",
                pair[0], pair[1]
            )));
        }
    }

    let mut transforms = Vec::new();
    let mut fields = BTreeMap::new();
    let mut mask = Vec::new();
    for (path, value) in updates {
        match value.sentinel() {
            Some(SentinelValue::Delete) => mask.push(path.clone()),
            Some(sentinel) => transforms.push(transform_from_sentinel(path, sentinel)?),
            None => {
                let mut nested = ExtractedSentinels::default();
                let cleaned = extract_value(value, path, &mut nested)?;
                if let Some(delete) = nested.deletes.first() {
                    return Err(sentinel_misuse(format!(
                        "Delete must be the value of an updated field, found it at '{delete}'"
                    )));
                }
                transforms.extend(nested.transforms);
                if let Some(cleaned) = cleaned {
                    set_value_at_field_path(&mut fields, path, cleaned);
                }
                mask.push(path.clone());
            }
        }
    }
    mask.sort();

    let update = (!mask.is_empty()).then(|| (fields, Some(mask)));
    Ok(assemble_writes(
        &mutation.key,
        update,
        transforms,
        Some(precondition),
    ))
}

fn assemble_writes(
    key: &DocumentKey,
    update: Option<(BTreeMap<String, FirestoreValue>, Option<Vec<FieldPath>>)>,
    mut transforms: Vec<FieldTransform>,
    precondition: Option<Precondition>,
) -> Vec<Write> {
    transforms.sort_by(|left, right| left.field_path().cmp(right.field_path()));

    let mut precondition = precondition;
    let mut writes = Vec::with_capacity(2);
    if let Some((fields, mask)) = update {
        writes.push(Write::new(
            WriteOperation::Update {
                key: key.clone(),
                fields: MapValue::new(fields),
                mask,
            },
            precondition.take(),
        ));
    }
    if !transforms.is_empty() {
        writes.push(Write::new(
            WriteOperation::Transform {
                key: key.clone(),
                field_transforms: transforms,
            },
            precondition.take(),
        ));
    }
    writes
}

/// Sentinels pulled out of a data tree while copying the plain values.
#[derive(Debug, Default)]
struct ExtractedSentinels {
    transforms: Vec<FieldTransform>,
    deletes: Vec<FieldPath>,
}

fn extract_map(
    data: &BTreeMap<String, FirestoreValue>,
    parent: Option<&FieldPath>,
    extracted: &mut ExtractedSentinels,
) -> FirestoreResult<BTreeMap<String, FirestoreValue>> {
    let mut cleaned = BTreeMap::new();
    for (key, value) in data {
        let path = match parent {
            Some(parent) => parent.child(key.clone())?,
            None => FieldPath::new([key.clone()])?,
        };
        if let Some(value) = extract_value(value, &path, extracted)? {
            cleaned.insert(key.clone(), value);
        }
    }
    Ok(cleaned)
}

/// Copies `value` without its sentinels. Returns `None` when nothing is left to write:
/// the value was a sentinel, or a map that only held sentinels.
fn extract_value(
    value: &FirestoreValue,
    path: &FieldPath,
    extracted: &mut ExtractedSentinels,
) -> FirestoreResult<Option<FirestoreValue>> {
    match value.kind() {
        ValueKind::Sentinel(SentinelValue::Delete) => {
            extracted.deletes.push(path.clone());
            Ok(None)
        }
        ValueKind::Sentinel(sentinel) => {
            extracted
                .transforms
                .push(transform_from_sentinel(path, sentinel)?);
            Ok(None)
        }
        ValueKind::Map(map) if map.is_empty() => Ok(Some(value.clone())),
        ValueKind::Map(map) => {
            let nested = extract_map(map.fields(), Some(path), extracted)?;
            Ok((!nested.is_empty()).then(|| FirestoreValue::from_map(nested)))
        }
        ValueKind::Array(_) => {
            assert_no_sentinel_in_array(value, path)?;
            Ok(Some(value.clone()))
        }
        _ => Ok(Some(value.clone())),
    }
}

fn transform_from_sentinel(
    field_path: &FieldPath,
    sentinel: &SentinelValue,
) -> FirestoreResult<FieldTransform> {
    let operation = match sentinel {
        SentinelValue::ServerTimestamp => TransformOperation::ServerTimestamp,
        SentinelValue::ArrayUnion(elements) => {
            assert_plain_elements(sentinel, elements, field_path)?;
            TransformOperation::ArrayUnion(elements.clone())
        }
        SentinelValue::ArrayRemove(elements) => {
            assert_plain_elements(sentinel, elements, field_path)?;
            TransformOperation::ArrayRemove(elements.clone())
        }
        SentinelValue::Delete => {
            return Err(sentinel_misuse(format!(
                "Delete is not a transform (field '{field_path}')"
            )))
        }
    };
    Ok(FieldTransform::new(field_path.clone(), operation))
}

fn assert_plain_elements(
    sentinel: &SentinelValue,
    elements: &[FirestoreValue],
    field_path: &FieldPath,
) -> FirestoreResult<()> {
    if elements.iter().any(FirestoreValue::contains_sentinel) {
        return Err(sentinel_misuse(format!(
            "{} elements cannot contain sentinel values (field '{field_path}')",
            sentinel.name()
        )));
    }
    Ok(())
}

fn assert_no_sentinel_in_array(value: &FirestoreValue, field_path: &FieldPath) -> FirestoreResult<()> {
    if value.contains_sentinel() {
        return Err(sentinel_misuse(format!(
            "Sentinel values cannot be used inside arrays (field '{field_path}')"
        )));
    }
    Ok(())
}

/// Paths of every non-map value and every empty map, depth first.
fn collect_leaf_paths(
    data: &BTreeMap<String, FirestoreValue>,
    parent: Option<&FieldPath>,
) -> FirestoreResult<Vec<FieldPath>> {
    let mut paths = Vec::new();
    for (key, value) in data {
        let path = match parent {
            Some(parent) => parent.child(key.clone())?,
            None => FieldPath::new([key.clone()])?,
        };
        match value.kind() {
            ValueKind::Map(map) if !map.is_empty() => {
                paths.extend(collect_leaf_paths(map.fields(), Some(&path))?);
            }
            _ => paths.push(path),
        }
    }
    Ok(paths)
}

fn value_at_path<'a>(
    fields: &'a BTreeMap<String, FirestoreValue>,
    path: &FieldPath,
) -> Option<&'a FirestoreValue> {
    let (first, rest) = path.segments().split_first()?;
    rest.iter()
        .try_fold(fields.get(first)?, |current, segment| current.as_map()?.get(segment))
}

fn set_value_at_field_path(
    fields: &mut BTreeMap<String, FirestoreValue>,
    path: &FieldPath,
    value: FirestoreValue,
) {
    set_value_at_segments(fields, path.segments(), value);
}

fn set_value_at_segments(
    fields: &mut BTreeMap<String, FirestoreValue>,
    segments: &[String],
    value: FirestoreValue,
) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        fields.insert(first.clone(), value);
        return;
    }

    let mut child_fields = match fields.remove(first).map(FirestoreValue::into_kind) {
        Some(ValueKind::Map(map)) => map.into_fields(),
        _ => BTreeMap::new(),
    };
    set_value_at_segments(&mut child_fields, rest, value);
    fields.insert(first.clone(), FirestoreValue::from_map(child_fields));
}
