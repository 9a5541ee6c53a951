//! Demo projects bundled with the library.
//!
//! Each project is embedded as TOML and exercises a different part of the
//! engine: stacks, audio rendering, containers, feedback, packs and the
//! fix layer.

use crate::ProjectFile;

/// Array of factory project names for external access.
pub static FACTORY_PROJECT_NAMES: &[&str] = &["pulse", "sine", "clip", "echo", "arp", "needs-fix"];

/// TOML content for factory projects.
static FACTORY_PROJECTS_TOML: &[(&str, &str)] = &[
    ("pulse", PULSE_PROJECT),
    ("sine", SINE_PROJECT),
    ("clip", CLIP_PROJECT),
    ("echo", ECHO_PROJECT),
    ("arp", ARP_PROJECT),
    ("needs-fix", NEEDS_FIX_PROJECT),
];

/// Serial stack of event cards.
const PULSE_PROJECT: &str = r#"
name = "Pulse"
description = "Eighth-note pulse transposed up a fifth"

[[cards]]
id = "gen"
type = "gen.pulse"
[cards.params]
per_beat = 2
pitch = 60

[[cards]]
id = "up"
type = "fx.transpose"
[cards.params]
semitones = 7

[[cards]]
id = "out"
type = "out.events"

[[stacks]]
id = "main"
cards = ["gen", "up", "out"]
"#;

/// Notes rendered to audio, gain modulated by a control.
const SINE_PROJECT: &str = r#"
name = "Sine"
description = "Quarter-note sine voice with a constant gain offset"

[engine.executor]
batch_ticks = 24

[[cards]]
id = "gen"
type = "gen.pulse"
[cards.params]
per_beat = 1
pitch = 69
gate = 0.75

[[cards]]
id = "voice"
type = "synth.sine"
[cards.params]
gain = 0.3

[[cards]]
id = "amp"
type = "fx.gain"

[[cards]]
id = "wobble"
type = "ctl.constant"
[cards.params]
value = -0.25

[[cards]]
id = "out"
type = "out.audio"

[[stacks]]
id = "voice"
cards = ["gen", "voice", "amp", "out"]

[[stacks.bindings]]
from_card = "voice"
from_port = "out"
to_card = "amp"
to_port = "in"

[[edges]]
from = "wobble:out"
to = "amp:mod"
"#;

/// Looping clip read from a container, quantized.
const CLIP_PROJECT: &str = r#"
name = "Clip"
description = "Loops a hand-played phrase from a container and quantizes it"

[[containers.phrase]]
id = "n1"
kind = "note"
start = 3
duration = 40
payload = { pitch = 60, velocity = 96 }

[[containers.phrase]]
id = "n2"
kind = "note"
start = 99
duration = 40
payload = { pitch = 63, velocity = 80 }

[[containers.phrase]]
id = "n3"
kind = "note"
start = 190
duration = 90
payload = { pitch = 67, velocity = 110 }

[[cards]]
id = "clip"
type = "gen.clip"
[cards.params]
container = "phrase"
loop_ticks = 384

[[cards]]
id = "grid"
type = "fx.quantize"
[cards.params]
per_beat = 2

[[cards]]
id = "out"
type = "out.events"

[[stacks]]
id = "main"
cards = ["clip", "grid", "out"]
"#;

/// Feedback loop through a delay card.
const ECHO_PROJECT: &str = r#"
name = "Echo"
description = "Each window's notes come back one window later, softer and a fifth higher"

[[cards]]
id = "gen"
type = "gen.pulse"
[cards.params]
per_beat = 1

[[cards]]
id = "mix"
type = "merge.events"

[[cards]]
id = "soft"
type = "fx.velocity"
[cards.params]
scale = 0.5

[[cards]]
id = "up"
type = "fx.transpose"
[cards.params]
semitones = 7

[[cards]]
id = "echo"
type = "util.delay.events"

[[cards]]
id = "out"
type = "out.events"

[[edges]]
from = "gen:out"
to = "mix:in"

[[edges]]
from = "echo:out"
to = "mix:in"

[[edges]]
from = "mix:out"
to = "out:in"

[[edges]]
from = "mix:out"
to = "soft:in"

[[edges]]
from = "soft:out"
to = "up:in"

[[edges]]
from = "up:out"
to = "echo:in"
"#;

/// Uses a card from a bundled pack.
const ARP_PROJECT: &str = r#"
name = "Arp"
description = "Half-note pulse split into rising arpeggios"
packs = ["arp"]

[[cards]]
id = "gen"
type = "gen.pulse"
[cards.params]
per_beat = 1
gate = 1.0

[[cards]]
id = "arp"
type = "arp.up"
[cards.params]
steps = 4
interval = 3

[[cards]]
id = "out"
type = "out.events"

[[stacks]]
id = "main"
cards = ["gen", "arp", "out"]
"#;

/// Wiring problems the fix layer repairs.
const NEEDS_FIX_PROJECT: &str = r#"
name = "Needs Fix"
description = "Two generators share one input and notes feed an audio sink"

[[cards]]
id = "kick"
type = "gen.pulse"
[cards.params]
per_beat = 1
pitch = 36

[[cards]]
id = "hat"
type = "gen.pulse"
[cards.params]
per_beat = 4
pitch = 42

[[cards]]
id = "events"
type = "out.events"

[[cards]]
id = "level"
type = "out.audio"

[[edges]]
from = "kick:out"
to = "events:in"

[[edges]]
from = "hat:out"
to = "events:in"

[[edges]]
from = "kick:out"
to = "level:in"
"#;

/// Get all factory projects.
pub fn factory_projects() -> Vec<ProjectFile> {
    FACTORY_PROJECTS_TOML
        .iter()
        .filter_map(|(_, toml)| ProjectFile::from_toml(toml).ok())
        .collect()
}

/// Get a factory project by id or display name, case-insensitive.
pub fn get_factory_project(name: &str) -> Option<ProjectFile> {
    let name_lower = name.to_lowercase();

    if let Some((_, toml)) = FACTORY_PROJECTS_TOML.iter().find(|(id, _)| *id == name_lower) {
        return ProjectFile::from_toml(toml).ok();
    }

    factory_projects()
        .into_iter()
        .find(|p| p.name.to_lowercase() == name_lower)
}

/// Get the ids of all factory projects.
pub fn factory_project_names() -> Vec<&'static str> {
    FACTORY_PROJECTS_TOML.iter().map(|(name, _)| *name).collect()
}

/// Check if a name refers to a factory project.
pub fn is_factory_project(name: &str) -> bool {
    get_factory_project(name).is_some()
}
