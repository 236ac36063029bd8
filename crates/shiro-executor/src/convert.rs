//! Conversion from the wire client's value representation to the
//! workspace-wide [`shiro_types::Value`].

use shiro_types::Value;

pub fn from_mysql_value(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Int(i) => Value::Int(i),
        mysql_async::Value::UInt(u) => Value::UInt(u),
        mysql_async::Value::Float(f) => Value::Double(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Double(d),
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
        mysql_async::Value::Date(year, month, day, hour, minute, second, micros) => {
            match chrono::NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                }) {
                Some(dt) => Value::DateTime(dt),
                None => Value::Null,
            }
        }
        mysql_async::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            Value::Text(format!(
                "{sign}{days}d {hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}
