//! Adapters, merges, feedback delays and sinks.
//!
//! These are the cards the fix planner inserts: adapters bridge port types,
//! merges give fan-in a single owner, and delays turn a cycle into a legal
//! one-window feedback loop.

use cardplay_core::{
    AudioBuffer, CardCategory, CardDefinition, CardError, PortSpec, ProcessContext, RuntimeValue,
};

use crate::types::{AUDIO, CONTROL, NOTES};

/// Routing card definitions.
pub fn cards() -> Vec<CardDefinition> {
    vec![
        // Adapters
        CardDefinition::new("adapt.notes-to-control", CardCategory::Adapter, notes_to_control)
            .describe("Loudest note velocity as a 0..1 control")
            .input(PortSpec::new("in", NOTES))
            .output(PortSpec::new("out", CONTROL)),
        CardDefinition::new("adapt.control-to-audio", CardCategory::Adapter, control_to_audio)
            .describe("Holds a control value as a constant audio signal")
            .input(PortSpec::new("in", CONTROL))
            .output(PortSpec::new("out", AUDIO)),
        // Merges
        CardDefinition::new("merge.events", CardCategory::Merge, merge_events)
            .describe("Combines event streams in time order")
            .input(PortSpec::new("in", NOTES).multi())
            .output(PortSpec::new("out", NOTES)),
        CardDefinition::new("merge.audio", CardCategory::Merge, merge_audio)
            .describe("Sums audio buffers")
            .input(PortSpec::new("in", AUDIO).multi())
            .output(PortSpec::new("out", AUDIO)),
        CardDefinition::new("merge.control", CardCategory::Merge, merge_control)
            .describe("Sums control values")
            .input(PortSpec::new("in", CONTROL).multi())
            .output(PortSpec::new("out", CONTROL)),
        // Feedback delays
        CardDefinition::new("util.delay.events", CardCategory::Delay, delay_events)
            .describe("Replays last window's events one window later")
            .input(PortSpec::new("in", NOTES).feedback())
            .output(PortSpec::new("out", NOTES))
            .state_field(PRIMED, false)
            .state_field(PREVIOUS_FROM, 0i64),
        CardDefinition::new("util.delay.audio", CardCategory::Delay, delay_audio)
            .describe("Last window's audio")
            .input(PortSpec::new("in", AUDIO).feedback())
            .output(PortSpec::new("out", AUDIO)),
        CardDefinition::new("util.delay.control", CardCategory::Delay, delay_control)
            .describe("Last window's control value")
            .input(PortSpec::new("in", CONTROL).feedback())
            .output(PortSpec::new("out", CONTROL)),
        // Sinks
        CardDefinition::new("out.events", CardCategory::Sink, sink)
            .describe("Event output")
            .input(PortSpec::new("in", NOTES))
            .output(PortSpec::new("out", NOTES)),
        CardDefinition::new("out.audio", CardCategory::Sink, sink)
            .describe("Audio output")
            .input(PortSpec::new("in", AUDIO))
            .output(PortSpec::new("out", AUDIO)),
    ]
}

const PRIMED: &str = "primed";
const PREVIOUS_FROM: &str = "previous_from";

/// Loudest velocity divided by 127, or 0 without notes.
pub fn notes_to_control(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let loudest = ctx
        .events("in")
        .iter()
        .filter_map(|e| e.payload_i64("velocity"))
        .max()
        .unwrap_or(0);
    ctx.set_output("out", RuntimeValue::Control(loudest as f64 / 127.0));
    Ok(())
}

/// Fills the window with the control value.
pub fn control_to_audio(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let level = ctx.control("in").unwrap_or(0.0) as f32;
    let buffer = AudioBuffer {
        sample_rate: ctx.transport.sample_rate,
        samples: vec![level; ctx.frames()],
    };
    ctx.set_output("out", RuntimeValue::AudioBuffer(buffer));
    Ok(())
}

/// Concatenates every producer's events; the executor orders them.
pub fn merge_events(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let events = ctx
        .inputs("in")
        .iter()
        .filter_map(RuntimeValue::as_events)
        .flatten()
        .cloned()
        .collect();
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

/// Sample-wise sum of every producer's buffer.
pub fn merge_audio(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let mut mix = AudioBuffer::silent(ctx.frames(), ctx.transport.sample_rate);
    for buffer in ctx.inputs("in").iter().filter_map(RuntimeValue::as_audio) {
        mix.mix_in(buffer);
    }
    ctx.set_output("out", RuntimeValue::AudioBuffer(mix));
    Ok(())
}

/// Sum of every producer's control value.
pub fn merge_control(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let sum = ctx.inputs("in").iter().filter_map(RuntimeValue::as_control).sum();
    ctx.set_output("out", RuntimeValue::Control(sum));
    Ok(())
}

/// Shifts the latched events forward by the distance between windows.
pub fn delay_events(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let primed = ctx.state.get(PRIMED).and_then(|v| v.as_bool()).unwrap_or(false);
    let previous = ctx.state.get(PREVIOUS_FROM).and_then(|v| v.as_i64()).unwrap_or(0);
    let delta = ctx.window.from - previous;
    let events = if primed {
        ctx.events("in")
            .iter()
            .cloned()
            .map(|mut e| {
                e.start += delta;
                e
            })
            .collect()
    } else {
        Vec::new()
    };
    ctx.state.insert(PRIMED.to_string(), true.into());
    ctx.state.insert(PREVIOUS_FROM.to_string(), ctx.window.from.into());
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

/// Last window's audio, trimmed or padded to this window's length.
pub fn delay_audio(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let frames = ctx.frames();
    let mut buffer = ctx
        .audio("in")
        .cloned()
        .unwrap_or_else(|| AudioBuffer::silent(frames, ctx.transport.sample_rate));
    buffer.samples.resize(frames, 0.0);
    ctx.set_output("out", RuntimeValue::AudioBuffer(buffer));
    Ok(())
}

/// Last window's control value.
pub fn delay_control(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let value = ctx.control("in").unwrap_or(0.0);
    ctx.set_output("out", RuntimeValue::Control(value));
    Ok(())
}

/// Passes its input through so the host can read it from `out`.
pub fn sink(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    if let Some(value) = ctx.input("in").cloned() {
        ctx.set_output("out", value);
    }
    Ok(())
}
