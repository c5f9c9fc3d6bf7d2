use chrono::{
  DateTime,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;

use crate::error::{
  TaskError,
  TaskResult
};

const WIRE_DUE_FORMAT: &str =
  "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Wall-clock time in `tz` for an
/// absolute instant.
#[must_use]
pub fn to_local(
  now: DateTime<Utc>,
  tz: Tz
) -> NaiveDateTime {
  now.with_timezone(&tz).naive_local()
}

fn from_local(
  local_naive: NaiveDateTime,
  tz: Tz
) -> Option<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Some(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      Some(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => {
      tracing::warn!(
        local = %local_naive,
        "local datetime does not exist in configured timezone"
      );
      None
    }
  }
}

/// Lenient reading of a backend due
/// date. Offsets are converted into
/// `tz`; naive values are taken as
/// already local; bare dates land at
/// midnight.
pub fn parse_due_date(
  raw: &str,
  tz: Tz
) -> Option<NaiveDateTime> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(
      dt.with_timezone(&tz)
        .naive_local()
    );
  }

  parse_naive(token)
}

fn parse_naive(
  token: &str
) -> Option<NaiveDateTime> {
  for format in NAIVE_FORMATS {
    if let Ok(parsed) =
      NaiveDateTime::parse_from_str(
        token, format
      )
    {
      return Some(parsed);
    }
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .ok()
  .map(|date| {
    date.and_time(NaiveTime::MIN)
  })
}

/// Reads a creation timestamp. Naive
/// values are interpreted in `tz`.
pub fn parse_timestamp(
  raw: &str,
  tz: Tz
) -> Option<DateTime<Utc>> {
  let token = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(dt.with_timezone(&Utc));
  }

  parse_naive(token).and_then(|naive| {
    from_local(naive, tz)
  })
}

/// Due dates always travel with an
/// explicit time component; a
/// date-only value becomes
/// `YYYY-MM-DDT00:00:00`.
#[must_use]
pub fn format_wire_due(
  due: NaiveDateTime
) -> String {
  due.format(WIRE_DUE_FORMAT).to_string()
}

#[must_use]
pub fn format_due(
  due: NaiveDateTime
) -> String {
  if due.time() == NaiveTime::MIN {
    due.format("%Y-%m-%d").to_string()
  } else {
    due.format("%Y-%m-%d %H:%M").to_string()
  }
}

/// User-entered due date: a calendar
/// date, optionally with a time.
pub fn parse_due_input(
  raw: &str
) -> TaskResult<NaiveDateTime> {
  parse_naive(raw.trim()).ok_or_else(
    || {
      TaskError::Validation(format!(
        "invalid due date '{raw}' \
         (expected YYYY-MM-DD or \
         YYYY-MM-DDTHH:MM)"
      ))
    }
  )
}

pub fn parse_date_bound(
  raw: &str
) -> TaskResult<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    "%Y-%m-%d"
  )
  .map_err(|_| {
    TaskError::Validation(format!(
      "invalid date '{raw}' (expected \
       YYYY-MM-DD)"
    ))
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    format_wire_due,
    parse_due_date,
    parse_due_input,
    parse_timestamp,
    parse_timezone,
    to_local
  };

  #[test]
  fn date_only_due_lands_at_midnight()
  {
    let due = parse_due_date(
      "2020-01-01",
      chrono_tz::UTC
    )
    .expect("parse date");
    assert_eq!(
      format_wire_due(due),
      "2020-01-01T00:00:00"
    );
  }

  #[test]
  fn offset_due_is_moved_into_zone() {
    let tz = parse_timezone(
      "America/Mexico_City",
      "test"
    )
    .expect("valid zone");
    let due = parse_due_date(
      "2026-02-17T06:00:00Z",
      tz
    )
    .expect("parse rfc3339");
    assert_eq!(
      due
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2026-02-17 00:00"
    );
  }

  #[test]
  fn naive_due_keeps_wall_clock() {
    let due = parse_due_date(
      "2026-02-17T15:30:00.000",
      chrono_tz::Europe::Berlin
    )
    .expect("parse naive");
    assert_eq!(
      format_wire_due(due),
      "2026-02-17T15:30:00"
    );
  }

  #[test]
  fn garbage_due_is_absent() {
    assert!(
      parse_due_date(
        "next tuesday",
        chrono_tz::UTC
      )
      .is_none()
    );
    assert!(
      parse_due_date("  ", chrono_tz::UTC)
        .is_none()
    );
  }

  #[test]
  fn naive_timestamp_uses_zone() {
    let parsed = parse_timestamp(
      "2026-02-17T12:00:00",
      chrono_tz::Asia::Tokyo
    )
    .expect("parse timestamp");
    let expected = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 3, 0, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(parsed, expected);
  }

  #[test]
  fn local_clock_follows_zone() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 3, 0, 0
      )
      .single()
      .expect("valid now");
    let local =
      to_local(now, chrono_tz::US::Pacific);
    assert_eq!(
      local.date(),
      NaiveDate::from_ymd_opt(2026, 2, 16)
        .expect("valid date")
    );
  }

  #[test]
  fn rejects_unparseable_input() {
    assert!(
      parse_due_input("tomorrow").is_err()
    );
    assert!(
      parse_due_input("2026-03-01T09:30")
        .is_ok()
    );
  }
}
