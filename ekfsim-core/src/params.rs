//! Vehicle parameter files
//!
//! Lines look like `1 1 EK3_SRC1_POSXY 3 2` (system, component, name, value,
//! type). Anything that does not parse is reported and skipped so one bad
//! line never prevents a run.

use anyhow::{Context, Result};
use mavlink::ardupilotmega::MavParamType;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Longest parameter name MAVLink can carry
pub const MAX_NAME_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: f32,
    /// MAV_PARAM_TYPE, 1 (UINT8) through 10 (REAL64)
    pub param_type: u8,
}

impl Param {
    /// NUL padded name as carried by PARAM_SET
    pub fn id_bytes(&self) -> [u8; MAX_NAME_LEN] {
        let mut id = [0u8; MAX_NAME_LEN];
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        id[..len].copy_from_slice(&bytes[..len]);
        id
    }

    pub fn mav_type(&self) -> MavParamType {
        // Only constructed through parse_param, which validates the range
        mav_param_type(self.param_type).unwrap_or(MavParamType::MAV_PARAM_TYPE_REAL32)
    }
}

fn mav_param_type(value: u8) -> Option<MavParamType> {
    use MavParamType::*;
    let t = match value {
        1 => MAV_PARAM_TYPE_UINT8,
        2 => MAV_PARAM_TYPE_INT8,
        3 => MAV_PARAM_TYPE_UINT16,
        4 => MAV_PARAM_TYPE_INT16,
        5 => MAV_PARAM_TYPE_UINT32,
        6 => MAV_PARAM_TYPE_INT32,
        7 => MAV_PARAM_TYPE_UINT64,
        8 => MAV_PARAM_TYPE_INT64,
        9 => MAV_PARAM_TYPE_REAL32,
        10 => MAV_PARAM_TYPE_REAL64,
        _ => return None,
    };
    Some(t)
}

fn is_skipped(line: &str) -> bool {
    line.trim_end().len() < 2 || line.starts_with('#')
}

/// Parse one line. Returns None (after a warning) for malformed input.
pub fn parse_param(line: &str) -> Option<Param> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let parsed = (|| {
        let name = *fields.get(2)?;
        let value = fields.get(3)?.parse::<f32>().ok()?;
        let param_type = fields.get(4)?.parse::<u8>().ok()?;
        if name.len() > MAX_NAME_LEN || mav_param_type(param_type).is_none() {
            return None;
        }
        Some(Param {
            name: name.to_string(),
            value,
            param_type,
        })
    })();

    if parsed.is_none() {
        warn!("skipping malformed parameter line {:?}", line.trim_end());
    }
    parsed
}

pub fn parse_params_str(text: &str) -> Vec<Param> {
    text.lines()
        .filter(|line| !is_skipped(line))
        .filter_map(parse_param)
        .collect()
}

pub fn parse_params(path: &Path) -> Result<Vec<Param>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read parameter file {}", path.display()))?;
    Ok(parse_params_str(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_line() {
        let param = parse_param("1\t1\tEK3_SRC1_POSXY\t3\t2").unwrap();
        assert_eq!(param.name, "EK3_SRC1_POSXY");
        assert_eq!(param.value, 3.0);
        assert_eq!(param.param_type, 2);
        assert_eq!(param.mav_type(), MavParamType::MAV_PARAM_TYPE_INT8);
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        let text = "\n# fusion tuning\n1 1 VISO_TYPE 1 2\n \n#1 1 GPS_TYPE 14 2\n";
        let params = parse_params_str(text);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "VISO_TYPE");
    }

    #[test]
    fn test_malformed_lines_yield_nothing() {
        assert!(parse_param("1 1 ONLY_NAME").is_none());
        assert!(parse_param("1 1 BAD_VALUE abc 9").is_none());
        assert!(parse_param("1 1 BAD_TYPE 1.0 42").is_none());
        assert!(parse_param("1 1 NAME_THAT_IS_FAR_TOO_LONG 1.0 9").is_none());

        let params = parse_params_str("1 1 GOOD 1.5 9\ngarbage line here\n");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].value, 1.5);
    }

    #[test]
    fn test_id_bytes_are_nul_padded() {
        let param = Param {
            name: "VISO_TYPE".to_string(),
            value: 1.0,
            param_type: 2,
        };
        let id = param.id_bytes();
        assert_eq!(&id[..9], b"VISO_TYPE");
        assert!(id[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_params_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fusion.params");
        std::fs::write(&path, "# header\n1 1 EK3_SRC2_VELXY 6 2\n1 1 RNGFND1_TYPE 10 2\n").unwrap();

        let params = parse_params(&path).unwrap();
        assert_eq!(params.len(), 2);
        assert!(parse_params(&dir.path().join("missing.params")).is_err());
    }
}
