//! Event and control generators.
//!
//! Generators have no inputs. Everything they emit is a pure function of
//! parameters, the window, the transport and (for `gen.clip`) the host's
//! containers, so batched evaluation produces the same events as one large
//! window.

use cardplay_core::{
    CardCategory, CardDefinition, CardError, Event, ParamSpec, PortSpec, ProcessContext,
    RuntimeValue, Tick,
};

use crate::types::{CONTROL, NOTES};

/// Generator card definitions.
pub fn cards() -> Vec<CardDefinition> {
    vec![
        CardDefinition::new("gen.pulse", CardCategory::Generator, pulse)
            .describe("Repeating note on a beat subdivision")
            .output(PortSpec::new("out", NOTES))
            .param(ParamSpec::integer("per_beat", 1, 16, 4).describe("Pulses per beat"))
            .param(ParamSpec::integer("pitch", 0, 127, 60))
            .param(ParamSpec::integer("velocity", 1, 127, 100))
            .param(ParamSpec::number("gate", 0.0, 1.0, 0.5).describe("Note length as a fraction of the step")),
        CardDefinition::new("gen.clip", CardCategory::Generator, clip)
            .describe("Plays events from a named container")
            .output(PortSpec::new("out", NOTES))
            .param(ParamSpec::text("container", "main"))
            .param(ParamSpec::integer("loop_ticks", 0, 1 << 24, 0).describe("Loop length; 0 plays once")),
        CardDefinition::new("ctl.constant", CardCategory::Generator, constant)
            .describe("Fixed control value")
            .output(PortSpec::new("out", CONTROL))
            .param(ParamSpec::number("value", -1.0e6, 1.0e6, 0.0)),
    ]
}

/// First multiple of `step` at or after `tick`.
fn first_step(tick: Tick, step: Tick) -> Tick {
    (tick + step - 1).div_euclid(step) * step
}

/// Emits one note per subdivision start inside the window.
///
/// Event ids are `"{node}#{tick}"`, stable across windows and batches.
pub fn pulse(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let per_beat = ctx.params.i64_or("per_beat", 4).clamp(1, 16) as u32;
    let step = ctx.transport.ticks_per_division(per_beat);
    let pitch = ctx.params.i64_or("pitch", 60);
    let velocity = ctx.params.i64_or("velocity", 100);
    let duration = ((step as f64 * ctx.params.f64_or("gate", 0.5)).round() as Tick).max(1);

    let mut events = Vec::new();
    let mut tick = first_step(ctx.window.from, step);
    while tick < ctx.window.to {
        events.push(Event::note(format!("{}#{tick}", ctx.node), tick, duration, pitch, velocity));
        tick += step;
    }
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

/// Emits the container events that start inside the window.
///
/// With a loop length, events in `[0, loop_ticks)` repeat every loop and
/// the repeat index is appended to their id.
pub fn clip(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let name = ctx.params.str_or("container", "main");
    let source = ctx
        .container(name)
        .ok_or_else(|| CardError::InvalidParam(format!("no container named '{name}'")))?;
    let window = ctx.window;
    let length = ctx.params.i64_or("loop_ticks", 0);

    let mut events = Vec::new();
    if length <= 0 {
        events.extend(source.iter().filter(|e| window.contains(e.start)).cloned());
    } else {
        for event in source.iter().filter(|e| (0..length).contains(&e.start)) {
            let mut round = (window.from - event.start).div_euclid(length);
            if event.start + round * length < window.from {
                round += 1;
            }
            loop {
                let start = event.start + round * length;
                if start >= window.to {
                    break;
                }
                let mut copy = event.clone();
                copy.id = format!("{}@{round}", event.id);
                copy.start = start;
                events.push(copy);
                round += 1;
            }
        }
    }
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

/// Emits the `value` parameter.
pub fn constant(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let value = ctx.params.f64_or("value", 0.0);
    ctx.set_output("out", RuntimeValue::Control(value));
    Ok(())
}
