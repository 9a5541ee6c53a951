//! Event transforms: pitch, timing and velocity.

use cardplay_core::{CardCategory, CardDefinition, CardError, Event, ParamSpec, PortSpec, ProcessContext, RuntimeValue};

use crate::types::NOTES;

/// Transform card definitions.
pub fn cards() -> Vec<CardDefinition> {
    let notes_in_out = |def: CardDefinition| def.input(PortSpec::new("in", NOTES)).output(PortSpec::new("out", NOTES));
    vec![
        notes_in_out(CardDefinition::new("fx.transpose", CardCategory::Transform, transpose))
            .describe("Shifts note pitches")
            .param(ParamSpec::integer("semitones", -48, 48, 0)),
        notes_in_out(CardDefinition::new("fx.quantize", CardCategory::Transform, quantize))
            .describe("Pulls note starts toward a beat grid")
            .param(ParamSpec::integer("per_beat", 1, 16, 4))
            .param(ParamSpec::number("strength", 0.0, 1.0, 1.0)),
        notes_in_out(CardDefinition::new("fx.velocity", CardCategory::Transform, velocity))
            .describe("Scales note velocities")
            .param(ParamSpec::number("scale", 0.0, 2.0, 1.0)),
    ]
}

fn map_events(ctx: &mut ProcessContext<'_>, f: impl Fn(&mut Event)) {
    let events = ctx
        .events("in")
        .iter()
        .cloned()
        .map(|mut e| {
            f(&mut e);
            e
        })
        .collect();
    ctx.set_output("out", RuntimeValue::EventStream(events));
}

fn set_payload(event: &mut Event, key: &str, value: i64) {
    if let Some(map) = event.payload.as_object_mut() {
        map.insert(key.to_string(), value.into());
    }
}

/// Adds `semitones` to every pitch, clamped to the MIDI range.
pub fn transpose(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let semitones = ctx.params.i64_or("semitones", 0);
    map_events(ctx, |e| {
        if let Some(pitch) = e.payload_i64("pitch") {
            set_payload(e, "pitch", (pitch + semitones).clamp(0, 127));
        }
    });
    Ok(())
}

/// Moves each start toward the nearest grid tick by `strength`.
pub fn quantize(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let per_beat = ctx.params.i64_or("per_beat", 4).clamp(1, 16) as u32;
    let step = ctx.transport.ticks_per_division(per_beat);
    let strength = ctx.params.f64_or("strength", 1.0).clamp(0.0, 1.0);
    map_events(ctx, |e| {
        let nearest = (e.start + step / 2).div_euclid(step) * step;
        e.start += ((nearest - e.start) as f64 * strength).round() as i64;
    });
    Ok(())
}

/// Multiplies velocities by `scale`, keeping them in `1..=127`.
pub fn velocity(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let scale = ctx.params.f64_or("scale", 1.0);
    map_events(ctx, |e| {
        if let Some(v) = e.payload_i64("velocity") {
            set_payload(e, "velocity", ((v as f64 * scale).round() as i64).clamp(1, 127));
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, card};
    use cardplay_core::{ParamValue, TickWindow};

    fn notes(events: Vec<Event>) -> RuntimeValue {
        RuntimeValue::EventStream(events)
    }

    #[test]
    fn transpose_clamps() {
        let out = Harness::new(card("fx.transpose"))
            .param("semitones", ParamValue::Int(12))
            .input("in", notes(vec![Event::note("a", 0, 1, 60, 100), Event::note("b", 1, 1, 120, 100)]))
            .run(TickWindow::new(0, 96))
            .unwrap();
        let pitches: Vec<i64> = out["out"]
            .as_events()
            .unwrap()
            .iter()
            .filter_map(|e| e.payload_i64("pitch"))
            .collect();
        assert_eq!(pitches, vec![72, 127]);
    }

    #[test]
    fn quantize_full_and_half_strength() {
        let input = notes(vec![Event::note("a", 5, 1, 60, 100), Event::note("b", 20, 1, 60, 100)]);
        let full = Harness::new(card("fx.quantize"))
            .input("in", input.clone())
            .run(TickWindow::new(0, 96))
            .unwrap();
        let starts: Vec<i64> = full["out"].as_events().unwrap().iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![0, 24]);

        let half = Harness::new(card("fx.quantize"))
            .param("strength", ParamValue::Number(0.5))
            .input("in", input)
            .run(TickWindow::new(0, 96))
            .unwrap();
        let starts: Vec<i64> = half["out"].as_events().unwrap().iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![2, 22]);
    }

    #[test]
    fn velocity_stays_in_range() {
        let out = Harness::new(card("fx.velocity"))
            .param("scale", ParamValue::Number(2.0))
            .input("in", notes(vec![Event::note("a", 0, 1, 60, 100)]))
            .run(TickWindow::new(0, 96))
            .unwrap();
        assert_eq!(out["out"].as_events().unwrap()[0].payload_i64("velocity"), Some(127));
    }
}
