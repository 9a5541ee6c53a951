//! Small card set shared by the integration tests.
#![allow(dead_code)]

use cardplay_core::{
    AdapterEdge, AudioBuffer, CardCategory, CardDefinition, CardError, Event, Graph, GraphNode,
    ParamSpec, PortSpec, PortTypeDef, ProcessContext, RegistrySet, RuntimeValue, ValueKind,
};

fn osc(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let level = ctx.params.f64_or("level", 1.0);
    ctx.set_output("out", RuntimeValue::Control(level));
    Ok(())
}

fn render(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let level = ctx.control("in").unwrap_or(0.0) as f32;
    let buffer = AudioBuffer {
        sample_rate: ctx.transport.sample_rate,
        samples: vec![level; ctx.frames()],
    };
    ctx.set_output("out", RuntimeValue::AudioBuffer(buffer));
    Ok(())
}

fn pulse(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let step = ctx.transport.ticks_per_division(ctx.params.i64_or("per_beat", 4) as u32);
    let pitch = ctx.params.i64_or("pitch", 60);
    let mut tick = (ctx.window.from + step - 1).div_euclid(step) * step;
    let mut events = Vec::new();
    while tick < ctx.window.to {
        events.push(Event::note(format!("{}#{tick}", ctx.node), tick, step / 2, pitch, 100));
        tick += step;
    }
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

fn passthrough(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let events = ctx.inputs("in").iter().filter_map(RuntimeValue::as_events).flatten().cloned().collect();
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

fn transpose(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let semitones = ctx.params.i64_or("semitones", 0);
    let events = ctx
        .events("in")
        .iter()
        .cloned()
        .map(|mut e| {
            let pitch = e.payload_i64("pitch").unwrap_or(60) + semitones;
            e.payload["pitch"] = pitch.into();
            e
        })
        .collect();
    ctx.set_output("out", RuntimeValue::EventStream(events));
    Ok(())
}

fn noop(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
    Ok(())
}

fn fail(_: &mut ProcessContext<'_>) -> Result<(), CardError> {
    Err(CardError::Failed("boom".into()))
}

fn counter(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    let count = ctx.state.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
    ctx.state.insert("count".into(), count.into());
    ctx.set_output("out", RuntimeValue::Control(count as f64));
    Ok(())
}

fn wrong_kind(ctx: &mut ProcessContext<'_>) -> Result<(), CardError> {
    ctx.set_output("out", RuntimeValue::Control(1.0));
    Ok(())
}

/// Registries with the scenario card set.
pub fn registries() -> RegistrySet {
    let mut set = RegistrySet::new();
    set.register_port_type(PortTypeDef::new("Audio", ValueKind::AudioBuffer)).unwrap();
    set.register_port_type(PortTypeDef::new("Control", ValueKind::Control)).unwrap();
    set.register_port_type(PortTypeDef::new("notes", ValueKind::EventStream)).unwrap();

    let cards = [
        CardDefinition::new("Osc", CardCategory::Generator, osc)
            .output(PortSpec::new("out", "Control"))
            .param(ParamSpec::number("level", 0.0, 1.0, 1.0)),
        CardDefinition::new("Out", CardCategory::Sink, noop).input(PortSpec::new("in", "Audio")),
        CardDefinition::new("Render", CardCategory::Adapter, render)
            .input(PortSpec::new("in", "Control"))
            .output(PortSpec::new("out", "Audio")),
        CardDefinition::new("pulse", CardCategory::Generator, pulse)
            .output(PortSpec::new("out", "notes"))
            .param(ParamSpec::integer("per_beat", 1, 16, 4))
            .param(ParamSpec::integer("pitch", 0, 127, 60)),
        CardDefinition::new("sink", CardCategory::Sink, passthrough)
            .input(PortSpec::new("in", "notes"))
            .output(PortSpec::new("out", "notes")),
        CardDefinition::new("pass", CardCategory::Transform, passthrough)
            .input(PortSpec::new("in", "notes").optional())
            .output(PortSpec::new("out", "notes")),
        CardDefinition::new("transpose", CardCategory::Transform, transpose)
            .input(PortSpec::new("in", "notes"))
            .output(PortSpec::new("out", "notes"))
            .param(ParamSpec::integer("semitones", -48, 48, 0)),
        CardDefinition::new("merge.notes", CardCategory::Merge, passthrough)
            .input(PortSpec::new("in", "notes").multi())
            .output(PortSpec::new("out", "notes")),
        CardDefinition::new("delay", CardCategory::Delay, passthrough)
            .input(PortSpec::new("in", "notes").feedback().optional())
            .output(PortSpec::new("out", "notes")),
        CardDefinition::new("fail", CardCategory::Generator, fail).output(PortSpec::new("out", "notes")),
        CardDefinition::new("counter", CardCategory::Generator, counter)
            .output(PortSpec::new("out", "Control"))
            .state_field("count", 0i64),
        CardDefinition::new("liar", CardCategory::Generator, wrong_kind).output(PortSpec::new("out", "notes")),
    ];
    for card in cards {
        set.register_card(card).unwrap();
    }
    set.register_adapter(AdapterEdge::new("Control", "Audio", "Render", 2)).unwrap();
    set
}

/// Builds a graph from `(id, card_type)` nodes and `out -> in` edges.
pub fn chain(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> Graph {
    let mut g = Graph::new();
    for (id, card) in nodes {
        g.add_node(GraphNode::new(*id, card)).unwrap();
    }
    for (from, to) in edges {
        g.connect(from, "out", to, "in");
    }
    g
}
