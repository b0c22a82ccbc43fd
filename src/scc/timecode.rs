//! SCC timecode parsing (sec. 4.3, 6.3): `HH:MM:SS:FF`, drop-frame signaled
//! by a `;` anywhere among the separators.

use crate::error::{Error, Result};
use crate::time::Time;

/// Nominal CEA-608 frame rates: 30000/1001 drop-frame, 30/1 otherwise.
const DF_FPS: (i64, i64) = (30000, 1001);
const NDF_FPS: (i64, i64) = (30, 1);

pub struct Timecode {
    pub drop_frame: bool,
    pub time: Time,
}

/// Parses one `HH:MM:SS:FF` / `HH;MM;SS;FF` / mixed-separator timecode into
/// absolute rational seconds, applying the drop-frame skip rule when any
/// separator is `;`.
pub fn parse_timecode(s: &str) -> Result<Timecode> {
    let drop_frame = s.contains(';');
    let parts: Vec<&str> = s.split([':', ';']).collect();
    if parts.len() != 4 {
        return Err(Error::Parse(format!("malformed timecode: {}", s)));
    }
    let mut fields = [0i64; 4];
    for (i, p) in parts.iter().enumerate() {
        fields[i] = p.parse::<i64>().map_err(|_| Error::Parse(format!("malformed timecode: {}", s)))?;
    }
    let [hh, mm, ss, ff] = fields;
    if !(0..60).contains(&mm) || !(0..60).contains(&ss) {
        return Err(Error::Parse(format!("malformed timecode: {}", s)));
    }

    let nominal_frames = hh * 3600 * 30 + mm * 60 * 30 + ss * 30 + ff;
    let (fps_num, fps_den, frame_number) = if drop_frame {
        // Drop-frame skips frame numbers 0 and 1 at the start of every
        // minute except minutes that are multiples of 10.
        let total_minutes = hh * 60 + mm;
        let dropped = 2 * (total_minutes - total_minutes / 10);
        (DF_FPS.0, DF_FPS.1, nominal_frames - dropped)
    } else {
        (NDF_FPS.0, NDF_FPS.1, nominal_frames)
    };
    if frame_number < 0 {
        return Err(Error::Parse(format!("malformed timecode: {}", s)));
    }

    Ok(Timecode { drop_frame, time: Time::from_frames(frame_number, fps_num, fps_den)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndf_timecode_converts_at_30fps() {
        let tc = parse_timecode("00:00:00:22").unwrap();
        assert!(!tc.drop_frame);
        assert_eq!(tc.time, Time::from_ratio(22, 30).unwrap());
    }

    #[test]
    fn df_timecode_is_recognized_by_semicolon() {
        let tc = parse_timecode("00:01:00;02").unwrap();
        assert!(tc.drop_frame);
    }

    #[test]
    fn df_skip_rule_applies_at_non_multiple_of_ten_minute() {
        // At minute 1 (not a multiple of 10), frames 0 and 1 are skipped:
        // 00:01:00;02 is the third actual frame of that minute.
        let tc = parse_timecode("00:01:00;02").unwrap();
        let expected_frame = 1 * 60 * 30 - 2;
        assert_eq!(tc.time, Time::from_frames(expected_frame, 30000, 1001).unwrap());
    }

    #[test]
    fn malformed_timecode_is_a_parse_error() {
        assert!(parse_timecode("not-a-timecode").is_err());
    }
}
