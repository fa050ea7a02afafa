use super::{AttributeValue, Attributes, Event, EventKind, SensorReport};
use crate::{Error, Result};
use tracing::debug;

/// Map a sensor report onto zero or more typed events.
///
/// Pure: the same report always yields the same events (ids included).
/// Readings below their threshold yield an empty vector; malformed reports
/// yield [`Error::InvalidReport`] and the caller decides whether to drop or
/// retry them.
pub fn derive_events(report: &SensorReport) -> Result<Vec<Event>> {
    if report.sensor_id.trim().is_empty() {
        return Err(Error::invalid_report("", "sensor id is empty"));
    }
    if !report.location.is_finite() {
        return Err(Error::invalid_report(
            &report.sensor_id,
            format!("location {} is not finite", report.location),
        ));
    }

    let events = match report.reading_kind.as_str() {
        "seismic" => seismic(report)?,
        "fire" => fire(report)?,
        "gas" => gas(report)?,
        "structural" => structural(report)?,
        "medical" => medical(report)?,
        other => {
            return Err(Error::invalid_report(
                &report.sensor_id,
                format!("unknown reading kind '{}'", other),
            ));
        }
    };

    debug!(
        "Derived {} event(s) from {} report {}",
        events.len(),
        report.reading_kind,
        report.sensor_id
    );
    Ok(events)
}

fn event(report: &SensorReport, kind: EventKind, severity: f64, attributes: Attributes) -> Event {
    Event::new(
        format!("{}:{}", report.sensor_id, kind),
        kind,
        report.location,
        severity,
        attributes,
    )
}

fn required_number(report: &SensorReport, key: &str) -> Result<f64> {
    match report.attributes.get(key) {
        Some(value) => expect_number(report, key, value),
        None => Err(Error::invalid_report(
            &report.sensor_id,
            format!("missing required attribute '{}'", key),
        )),
    }
}

fn optional_number(report: &SensorReport, key: &str) -> Result<Option<f64>> {
    report
        .attributes
        .get(key)
        .map(|value| expect_number(report, key, value))
        .transpose()
}

fn expect_number(report: &SensorReport, key: &str, value: &AttributeValue) -> Result<f64> {
    match value.as_number() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(Error::invalid_report(
            &report.sensor_id,
            format!("attribute '{}' must be a finite number, got '{}'", key, value),
        )),
    }
}

fn seismic(report: &SensorReport) -> Result<Vec<Event>> {
    let magnitude = required_number(report, "magnitude")?;
    let kind = if magnitude > 6.0 {
        EventKind::MajorEarthquake
    } else if magnitude > 4.0 {
        EventKind::Earthquake
    } else {
        return Ok(Vec::new());
    };

    let mut attributes = Attributes::new();
    attributes.insert("magnitude".into(), magnitude.into());
    attributes.insert("sensor_id".into(), report.sensor_id.as_str().into());
    Ok(vec![event(report, kind, magnitude / 10.0, attributes)])
}

fn fire(report: &SensorReport) -> Result<Vec<Event>> {
    let temperature = optional_number(report, "temperature")?;
    let smoke_level = optional_number(report, "smoke_level")?;
    if temperature.is_none() && smoke_level.is_none() {
        return Err(Error::invalid_report(
            &report.sensor_id,
            "fire reading needs 'temperature' or 'smoke_level'",
        ));
    }

    let temperature = temperature.unwrap_or(0.0);
    let smoke_level = smoke_level.unwrap_or(0.0);
    if temperature <= 100.0 && smoke_level <= 0.7 {
        return Ok(Vec::new());
    }

    let intensity = if temperature > 150.0 { "high" } else { "medium" };
    let mut attributes = Attributes::new();
    attributes.insert("temperature".into(), temperature.into());
    attributes.insert("smoke_level".into(), smoke_level.into());
    attributes.insert("intensity".into(), intensity.into());
    let severity = (temperature / 200.0).max(smoke_level);
    Ok(vec![event(report, EventKind::Fire, severity, attributes)])
}

fn gas(report: &SensorReport) -> Result<Vec<Event>> {
    let concentration = required_number(report, "gas_concentration")?;
    if concentration <= 0.5 {
        return Ok(Vec::new());
    }

    let gas_type = report
        .attributes
        .get("gas_type")
        .and_then(AttributeValue::as_text)
        .unwrap_or("unknown");
    let mut attributes = Attributes::new();
    attributes.insert("concentration".into(), concentration.into());
    attributes.insert("gas_type".into(), gas_type.into());
    Ok(vec![event(report, EventKind::GasLeak, concentration, attributes)])
}

fn structural(report: &SensorReport) -> Result<Vec<Event>> {
    let damage_level = required_number(report, "damage_level")?;
    let mut attributes = Attributes::new();
    attributes.insert("damage_level".into(), damage_level.into());

    let kind = if damage_level > 0.7 {
        let trapped = optional_number(report, "trapped_people")?.unwrap_or(0.0);
        attributes.insert("trapped_people".into(), trapped.into());
        EventKind::StructuralCollapse
    } else if damage_level > 0.4 {
        EventKind::StructuralDamage
    } else {
        return Ok(Vec::new());
    };

    Ok(vec![event(report, kind, damage_level, attributes)])
}

fn medical(report: &SensorReport) -> Result<Vec<Event>> {
    let injured = required_number(report, "injured_count")?;
    if injured <= 0.0 {
        return Ok(Vec::new());
    }

    let label = match report.attributes.get("severity") {
        None => "medium",
        Some(value) => value.as_text().ok_or_else(|| {
            Error::invalid_report(&report.sensor_id, "attribute 'severity' must be a label")
        })?,
    };
    let severity = match label {
        "low" => 0.25,
        "medium" => 0.5,
        "high" => 0.75,
        "critical" => 1.0,
        other => {
            return Err(Error::invalid_report(
                &report.sensor_id,
                format!("unknown severity label '{}'", other),
            ));
        }
    };
    let needs_evacuation = match report.attributes.get("needs_evacuation") {
        None => false,
        Some(value) => value.as_flag().ok_or_else(|| {
            Error::invalid_report(
                &report.sensor_id,
                "attribute 'needs_evacuation' must be a boolean",
            )
        })?,
    };

    let mut attributes = Attributes::new();
    attributes.insert("injured_count".into(), injured.into());
    attributes.insert("severity_label".into(), label.into());
    attributes.insert("needs_evacuation".into(), needs_evacuation.into());
    Ok(vec![event(report, EventKind::MedicalEmergency, severity, attributes)])
}
