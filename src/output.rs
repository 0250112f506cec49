//! JSONL writers for the unified (pre-flag) and flagged datasets.
//!
//! Follow-up fields are flattened with `_f1`/`_f2` origin suffixes. Flags
//! serialize as 0/1, with `null` kept for a province flag that never
//! resolved.

use crate::linkage::{FollowupResponses, QualityFlags, UnifiedRecord};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the record set without flag columns: the raw linked dataset handed
/// to reporting collaborators before any quality decision.
pub fn write_unified(path: impl AsRef<Path>, records: &[UnifiedRecord]) -> std::io::Result<()> {
    write_jsonl(path.as_ref(), records, false)
}

/// Write the decision-augmented dataset, flags included.
pub fn write_flagged(path: impl AsRef<Path>, records: &[UnifiedRecord]) -> std::io::Result<()> {
    write_jsonl(path.as_ref(), records, true)
}

fn write_jsonl(path: &Path, records: &[UnifiedRecord], include_flags: bool) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let row = record_to_json(record, include_flags);
        writeln!(writer, "{}", row)?;
    }
    writer.flush()?;

    log::info!("📝 Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn record_to_json(record: &UnifiedRecord, include_flags: bool) -> Value {
    let mut row = Map::new();
    row.insert("access_code".into(), json!(record.access_code));
    row.insert("entered_at".into(), json!(record.entered_at));
    row.insert("exited_at".into(), json!(record.exited_at));
    row.insert("finished".into(), json!(record.finished));
    row.insert("r_code".into(), json!(record.r_code));
    row.insert("s_code".into(), json!(record.s_code));
    row.insert("ip_address".into(), json!(record.ip_address));
    row.insert("age".into(), json!(record.age));
    row.insert("birth_year".into(), json!(record.birth_year));
    row.insert("birth_month".into(), json!(record.birth_month));
    row.insert("province".into(), json!(record.province));
    row.insert("cannabis_ever".into(), json!(record.cannabis_ever));
    row.insert("cannabis_ever_confirm".into(), json!(record.cannabis_ever_confirm));
    row.insert("cannabis_freq_3mo".into(), json!(record.cannabis_freq_3mo));
    row.insert("cannabis_3mo".into(), json!(record.cannabis_3mo));
    row.insert("cannabis_6mo".into(), json!(record.cannabis_6mo));

    for (item, value) in &record.items {
        row.insert(item.clone(), json!(value));
    }

    flatten_followup(&mut row, record.followup1.as_ref(), "_f1");
    flatten_followup(&mut row, record.followup2.as_ref(), "_f2");

    if include_flags {
        append_flags(&mut row, &record.flags);
    }

    Value::Object(row)
}

/// Link columns are always emitted per wave so a wave the participant never
/// reached shows up as missing rather than silently absent.
fn flatten_followup(row: &mut Map<String, Value>, wave: Option<&FollowupResponses>, suffix: &str) {
    match wave {
        Some(responses) => {
            row.insert(format!("entered_at{}", suffix), json!(responses.entered_at));
            row.insert(format!("exited_at{}", suffix), json!(responses.exited_at));
            row.insert(format!("finished{}", suffix), json!(responses.finished));
            for (key, value) in &responses.responses {
                row.insert(format!("{}{}", key, suffix), value.clone());
            }
        }
        None => {
            row.insert(format!("entered_at{}", suffix), Value::Null);
            row.insert(format!("exited_at{}", suffix), Value::Null);
            row.insert(format!("finished{}", suffix), Value::Null);
        }
    }
}

fn flag_value(flag: Option<bool>) -> Value {
    match flag {
        Some(raised) => json!(raised as i64),
        None => Value::Null,
    }
}

fn append_flags(row: &mut Map<String, Value>, flags: &QualityFlags) {
    row.insert("invalid_code".into(), flag_value(flags.invalid_code));
    row.insert("blank_code".into(), flag_value(flags.blank_code));
    row.insert("ac_duplicate".into(), flag_value(flags.ac_duplicate));
    row.insert("speeder".into(), flag_value(flags.speeder));
    row.insert("sl_flag".into(), flag_value(flags.sl_flag));
    row.insert("incon_ever".into(), flag_value(flags.incon_ever));
    row.insert("incon_ever_agree".into(), flag_value(flags.incon_ever_agree));
    row.insert("incon_freq".into(), flag_value(flags.incon_freq));
    row.insert("incon_recent".into(), flag_value(flags.incon_recent));
    row.insert("incon_age".into(), flag_value(flags.incon_age));
    row.insert("incon_province".into(), flag_value(flags.incon_province));
    row.insert("attncheck_fail".into(), flag_value(flags.attncheck_fail));
    row.insert("withdrew".into(), flag_value(flags.withdrew));
    row.insert("exclude".into(), flag_value(flags.exclude));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn record() -> UnifiedRecord {
        let mut items = BTreeMap::new();
        items.insert("cudit_1".to_string(), Some(2));
        let mut responses = BTreeMap::new();
        responses.insert("mood_1".to_string(), json!(4));

        let mut flags = QualityFlags::new();
        flags.invalid_code = Some(false);
        flags.speeder = Some(true);
        flags.incon_province = None;
        flags.exclude = Some(true);

        UnifiedRecord {
            access_code: "AC1".to_string(),
            entered_at: 1_700_000_000,
            exited_at: Some(1_700_001_800),
            finished: Some(true),
            r_code: Some("7AX".to_string()),
            s_code: Some("QW3RT9UP42".to_string()),
            ip_address: None,
            age: Some(29),
            birth_year: Some(1994),
            birth_month: Some(3),
            province: Some("Ontario".to_string()),
            cannabis_ever: Some(3),
            cannabis_ever_confirm: Some(3),
            cannabis_freq_3mo: Some(4),
            cannabis_3mo: Some(1),
            cannabis_6mo: Some(1),
            items,
            followup1: Some(FollowupResponses {
                access_code: "AC1".to_string(),
                entered_at: Some(1_700_500_000),
                exited_at: Some(1_700_500_900),
                finished: Some(true),
                responses,
            }),
            followup2: None,
            flags,
        }
    }

    #[test]
    fn test_followup_fields_are_suffixed() {
        let row = record_to_json(&record(), false);
        assert_eq!(row["entered_at_f1"], json!(1_700_500_000));
        assert_eq!(row["mood_1_f1"], json!(4));
        assert_eq!(row["entered_at_f2"], Value::Null);
        assert!(row.get("mood_1").is_none());
    }

    #[test]
    fn test_unified_output_has_no_flag_columns() {
        let row = record_to_json(&record(), false);
        assert!(row.get("exclude").is_none());
        assert!(row.get("speeder").is_none());
    }

    #[test]
    fn test_flags_encode_as_zero_one_null() {
        let row = record_to_json(&record(), true);
        assert_eq!(row["invalid_code"], json!(0));
        assert_eq!(row["speeder"], json!(1));
        assert_eq!(row["incon_province"], Value::Null);
        assert_eq!(row["exclude"], json!(1));
    }

    #[test]
    fn test_files_written_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flagged.jsonl");
        write_flagged(&path, &[record(), record()]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["access_code"], json!("AC1"));
    }
}
