//! Audio cards.
//!
//! Oscillators compute phase from the absolute frame index, so a note
//! rendered across several windows or batches is sample-identical to one
//! rendered in a single window.

use std::f64::consts::TAU;

use cardplay_core::{
    AudioBuffer, CardCategory, CardDefinition, CardError, CardState, Event, ParamSpec, ParamValue,
    PortSpec, ProcessContext, RuntimeValue,
};

use crate::types::{AUDIO, CONTROL, NOTES};

/// Audio card definitions.
pub fn cards() -> Vec<CardDefinition> {
    vec![
        CardDefinition::new("synth.sine", CardCategory::Audio, sine)
            .describe("Polyphonic sine voice per note")
            .input(PortSpec::new("in", NOTES).optional())
            .output(PortSpec::new("out", AUDIO))
            .param(ParamSpec::number("gain", 0.0, 1.0, 0.25))
            .state_field(HELD, "[]"),
        CardDefinition::new("fx.gain", CardCategory::Audio, gain)
            .describe("Scales audio, optionally modulated by a control input")
            .input(PortSpec::new("in", AUDIO))
            .input(PortSpec::new("mod", CONTROL).optional())
            .output(PortSpec::new("out", AUDIO))
            .param(ParamSpec::number("gain", 0.0, 4.0, 1.0)),
    ]
}

/// State key of notes still sounding at the end of the last window.
const HELD: &str = "held";

fn held_notes(state: &CardState) -> Result<Vec<Event>, CardError> {
    match state.get(HELD).and_then(ParamValue::as_str) {
        Some(text) => serde_json::from_str(text).map_err(|e| CardError::Failed(format!("corrupt voice state: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// MIDI pitch to frequency, A4 = 440 Hz.
pub fn pitch_to_hz(pitch: i64) -> f64 {
    440.0 * 2f64.powf((pitch - 69) as f64 / 12.0)
}

/// Renders a sine per note; notes longer than the window carry over.
pub fn sine(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let gain = ctx.params.f64_or("gain", 0.25);
    let sample_rate = ctx.transport.sample_rate;
    let first = ctx.first_frame();
    let frames = ctx.frames();
    let last = first + frames as i64;

    let mut voices = held_notes(&*ctx.state)?;
    voices.extend(ctx.events("in").iter().cloned());

    let mut buffer = AudioBuffer::silent(frames, sample_rate);
    if sample_rate > 0 {
        for voice in &voices {
            let start = ctx.transport.tick_to_frame(voice.start).max(first);
            let end = ctx.transport.tick_to_frame(voice.end()).min(last);
            let hz = pitch_to_hz(voice.payload_i64("pitch").unwrap_or(60));
            let amp = gain * voice.payload_i64("velocity").unwrap_or(100) as f64 / 127.0;
            for frame in start..end {
                let phase = TAU * hz * frame as f64 / f64::from(sample_rate);
                buffer.samples[(frame - first) as usize] += (amp * phase.sin()) as f32;
            }
        }
    }

    let window_end = ctx.window.to;
    voices.retain(|v| v.end() > window_end);
    let held = serde_json::to_string(&voices).map_err(|e| CardError::Failed(e.to_string()))?;
    ctx.state.insert(HELD.to_string(), ParamValue::Text(held));
    ctx.set_output("out", RuntimeValue::AudioBuffer(buffer));
    Ok(())
}

/// Multiplies by `gain * (1 + mod)`.
pub fn gain(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let factor = ctx.params.f64_or("gain", 1.0) * (1.0 + ctx.control("mod").unwrap_or(0.0));
    let mut buffer = ctx
        .audio("in")
        .cloned()
        .ok_or_else(|| CardError::MissingInput("in".to_string()))?;
    for sample in &mut buffer.samples {
        *sample = (f64::from(*sample) * factor) as f32;
    }
    ctx.set_output("out", RuntimeValue::AudioBuffer(buffer));
    Ok(())
}
