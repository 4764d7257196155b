//! Per-field diffing and action decisioning.

use fleetsync_model::{
    AttrValue, DestinationRecord, FieldVerdict, MappedAttributes, SyncAction, VerdictKind,
};

/// Compares mapped attributes against the matched destination record.
///
/// Without a destination record the action is `Create` and no verdicts are
/// produced. Otherwise every mapped leaf gets a verdict; nested objects are
/// walked key by key and arrays are compared as a whole. The action is
/// `Update` when any verdict is `New` or `Changed`, `Skip` otherwise.
pub fn diff(
    mapped: &MappedAttributes,
    destination: Option<&DestinationRecord>,
) -> (Vec<FieldVerdict>, SyncAction) {
    let Some(destination) = destination else {
        return (Vec::new(), SyncAction::Create);
    };

    let mut verdicts = Vec::new();
    for (key, value) in &mapped.fields {
        walk(key.clone(), value, destination, &mut verdicts);
    }

    let action = if verdicts.iter().any(FieldVerdict::is_dirty) {
        SyncAction::Update
    } else {
        SyncAction::Skip
    };
    (verdicts, action)
}

fn walk(path: String, value: &AttrValue, destination: &DestinationRecord, out: &mut Vec<FieldVerdict>) {
    if let AttrValue::Map(fields) = value {
        for (key, nested) in fields {
            walk(format!("{path}.{key}"), nested, destination, out);
        }
        return;
    }

    let old = destination.value_at(&path);
    let kind = match &old {
        None => VerdictKind::New,
        Some(current) if current.is_empty() => VerdictKind::New,
        Some(current) if value.matches(current) => VerdictKind::Unchanged,
        Some(_) => VerdictKind::Changed,
    };
    out.push(FieldVerdict {
        path,
        kind,
        old,
        new: value.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_model::{Attributes, Endpoint};

    fn mapped() -> MappedAttributes {
        let mut m = MappedAttributes::new(Endpoint::Workstations);
        m.fields.insert("name".into(), "WS-1".into());
        let mut os = Attributes::new();
        os.insert("os".into(), "Windows 11 Pro".into());
        os.insert("version".into(), "23H2".into());
        m.fields.insert("operating_system".into(), os.into());
        let mut memory = Attributes::new();
        memory.insert("physical_memory".into(), AttrValue::Integer(17_179_869_184));
        m.fields.insert("memory".into(), memory.into());
        m
    }

    fn current(os_version: &str, memory: &str) -> DestinationRecord {
        let mut os = Attributes::new();
        os.insert("os".into(), "WINDOWS 11 PRO".into());
        os.insert("version".into(), os_version.into());
        let mut mem = Attributes::new();
        mem.insert("physical_memory".into(), memory.into());
        DestinationRecord::new("d1", "ws-1")
            .with_attr("operating_system", AttrValue::Map(os))
            .with_attr("memory", AttrValue::Map(mem))
    }

    fn kind_of(verdicts: &[FieldVerdict], path: &str) -> VerdictKind {
        verdicts
            .iter()
            .find(|v| v.path == path)
            .map(|v| v.kind)
            .unwrap()
    }

    #[test]
    fn unmatched_is_create_without_verdicts() {
        let (verdicts, action) = diff(&mapped(), None);
        assert!(verdicts.is_empty());
        assert_eq!(action, SyncAction::Create);
    }

    #[test]
    fn identical_record_is_skip() {
        let (verdicts, action) = diff(&mapped(), Some(&current("23H2", "17179869184")));
        assert_eq!(action, SyncAction::Skip);
        assert_eq!(verdicts.len(), 4);
        assert!(verdicts.iter().all(|v| v.kind == VerdictKind::Unchanged));
    }

    #[test]
    fn one_changed_field_is_update() {
        let (verdicts, action) = diff(&mapped(), Some(&current("22H2", "17179869184")));
        assert_eq!(action, SyncAction::Update);
        assert_eq!(kind_of(&verdicts, "operating_system.version"), VerdictKind::Changed);
        assert_eq!(kind_of(&verdicts, "operating_system.os"), VerdictKind::Unchanged);
        assert_eq!(
            verdicts.iter().filter(|v| v.is_dirty()).count(),
            1,
            "only the version differs"
        );
    }

    #[test]
    fn empty_destination_value_is_new() {
        let record = current("23H2", "").with_attr("ip_address", AttrValue::Null);
        let mut m = mapped();
        m.fields.insert("ip_address".into(), "10.0.0.9".into());

        let (verdicts, action) = diff(&m, Some(&record));
        assert_eq!(action, SyncAction::Update);
        assert_eq!(kind_of(&verdicts, "memory.physical_memory"), VerdictKind::New);
        assert_eq!(kind_of(&verdicts, "ip_address"), VerdictKind::New);
    }

    #[test]
    fn numbers_are_not_compared_as_strings() {
        let (verdicts, _) = diff(&mapped(), Some(&current("23H2", " 17179869184")));
        assert_eq!(kind_of(&verdicts, "memory.physical_memory"), VerdictKind::Unchanged);
    }

    #[test]
    fn destination_only_fields_are_ignored() {
        let record = current("23H2", "17179869184").with_attr("department", "Finance");
        let (verdicts, action) = diff(&mapped(), Some(&record));
        assert_eq!(action, SyncAction::Skip);
        assert!(verdicts.iter().all(|v| v.path != "department"));
    }
}
