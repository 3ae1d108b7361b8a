use time::Date;
use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;

use crate::error::CompileError;
use crate::ir::SuppressionAuditEntry;
use crate::manifest::{Manifest, SuppressionRecord};

/// Validate every suppression record: required fields, a parseable
/// ISO-8601 expiry strictly in the future, and a target component that
/// exists. Valid records become audit entries in the plan.
pub fn evaluate(
    manifest: &Manifest,
    today: Date,
) -> Result<Vec<SuppressionAuditEntry>, CompileError> {
    let mut audit = Vec::new();
    for (index, record) in manifest.governance.cdk_nag.suppress.iter().enumerate() {
        audit.extend(evaluate_record(manifest, record, index, today)?);
    }
    Ok(audit)
}

fn evaluate_record(
    manifest: &Manifest,
    record: &SuppressionRecord,
    index: usize,
    today: Date,
) -> Result<Vec<SuppressionAuditEntry>, CompileError> {
    let pointer = format!("/governance/cdkNag/suppress/{index}");

    let id = require(record.id.as_deref(), "id", &pointer)?;
    let justification = require(record.justification.as_deref(), "justification", &pointer)?;
    let owner = require(record.owner.as_deref(), "owner", &pointer)?;
    let expires_on = require(record.expires_on.as_deref(), "expiresOn", &pointer)?;
    if record.applies_to.is_empty() {
        return Err(CompileError::GovernanceRecordInvalid {
            reason: format!("record `{id}` is missing required field `appliesTo`"),
            pointer: format!("{pointer}/appliesTo"),
        });
    }

    let expiry = Date::parse(expires_on, &Iso8601::DATE).map_err(|err| {
        CompileError::GovernanceRecordInvalid {
            reason: format!("record `{id}` has unparseable expiresOn `{expires_on}`: {err}"),
            pointer: format!("{pointer}/expiresOn"),
        }
    })?;
    if expiry <= today {
        return Err(CompileError::SuppressionExpired {
            id: id.to_string(),
            expires_on: expires_on.to_string(),
            today: today.to_string(),
        });
    }

    let mut entries = Vec::with_capacity(record.applies_to.len());
    for target in &record.applies_to {
        if manifest.component(&target.component).is_none() {
            return Err(CompileError::DanglingSuppression {
                id: id.to_string(),
                component: target.component.clone(),
            });
        }
        entries.push(SuppressionAuditEntry {
            kind: "cdk-nag-suppression".into(),
            id: id.to_string(),
            component: Some(target.component.clone()),
            justification: justification.to_string(),
            owner: Some(owner.to_string()),
            expires_on: Some(expires_on.to_string()),
        });
    }
    Ok(entries)
}

fn require<'a>(
    field: Option<&'a str>,
    name: &str,
    pointer: &str,
) -> Result<&'a str, CompileError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CompileError::GovernanceRecordInvalid {
            reason: format!("missing required field `{name}`"),
            pointer: format!("{pointer}/{name}"),
        })
}

/// Today's date in UTC, the synthesis date for expiry checks.
pub fn synthesis_date() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use serde_json::json;
    use time::macros::date;

    fn manifest_with(suppress: serde_json::Value) -> Manifest {
        Manifest::from_value(&json!({
            "service": "checkout",
            "components": [{"name": "primary-db", "type": "rds-postgres"}],
            "governance": {"cdkNag": {"suppress": suppress}}
        }))
        .expect("valid manifest")
    }

    fn full_record(expires_on: &str) -> serde_json::Value {
        json!([{
            "id": "AwsSolutions-IAM5",
            "justification": "wildcard required for dynamic prefixes",
            "owner": "team-payments",
            "expiresOn": expires_on,
            "appliesTo": [{"component": "primary-db"}]
        }])
    }

    #[test]
    fn valid_record_yields_audit_entries() {
        let manifest = manifest_with(full_record("2030-01-01"));
        let audit = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].id, "AwsSolutions-IAM5");
        assert_eq!(audit[0].component.as_deref(), Some("primary-db"));
    }

    #[test]
    fn expired_record_is_rejected() {
        let manifest = manifest_with(full_record("2023-06-15"));
        let err = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap_err();
        assert_eq!(err.code(), "suppression-expired");
        assert!(err.to_string().contains("2023-06-15"));
    }

    #[test]
    fn expiry_on_the_synthesis_date_counts_as_expired() {
        let manifest = manifest_with(full_record("2025-06-15"));
        let err = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap_err();
        assert_eq!(err.code(), "suppression-expired");
    }

    #[test]
    fn missing_fields_are_named() {
        let manifest = manifest_with(json!([{
            "id": "AwsSolutions-IAM5",
            "expiresOn": "2030-01-01",
            "appliesTo": [{"component": "primary-db"}]
        }]));
        let err = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap_err();
        assert_eq!(err.code(), "governance-record-invalid");
        assert!(err.to_string().contains("justification"));
    }

    #[test]
    fn unparseable_expiry_is_invalid_not_expired() {
        let manifest = manifest_with(full_record("next-summer"));
        let err = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap_err();
        assert_eq!(err.code(), "governance-record-invalid");
    }

    #[test]
    fn dangling_target_is_rejected() {
        let manifest = manifest_with(json!([{
            "id": "AwsSolutions-IAM5",
            "justification": "ok",
            "owner": "team",
            "expiresOn": "2030-01-01",
            "appliesTo": [{"component": "ghost-db"}]
        }]));
        let err = evaluate(&manifest, date!(2025 - 06 - 15)).unwrap_err();
        assert_eq!(err.code(), "dangling-suppression");
    }
}
