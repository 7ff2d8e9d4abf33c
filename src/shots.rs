//! The fixed registry of camera shots rendered from every source image.

use serde::Serialize;

/// Appended to every shot instruction so all plates share one look.
macro_rules! style_suffix {
    () => {
        "Maintain visual consistency with the original image, including all objects, \
         lighting, and perspective realism. The output style should be optimized for \
         forensic visualization: clean composition, muted colors, cinematic realism, \
         and a subtle film grain."
    };
}

/// Shared style-consistency clause that ends every shot prompt.
pub const STYLE_PROMPT_SUFFIX: &str = style_suffix!();

/// Number of shots in the registry.
pub const SHOT_COUNT: usize = 5;

/// A named camera shot and the prompt that produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShotProfile {
    /// Human-readable shot name.
    pub name: &'static str,
    /// Lens label, e.g. `24mm`.
    pub lens: &'static str,
    /// What the shot shows.
    pub description: &'static str,
    /// Full prompt sent to the model.
    pub prompt: &'static str,
}

/// All shots, in display order.
pub static SHOT_PROFILES: [ShotProfile; SHOT_COUNT] = [
    ShotProfile {
        name: "Wide Establishing Shot",
        lens: "24mm",
        description: "An overall view of the space, capturing the entire scene.",
        prompt: concat!(
            "Generate a wide establishing shot of this space, as if taken with a 24mm lens, \
             showing an overall view. ",
            style_suffix!()
        ),
    },
    ShotProfile {
        name: "Mid Room Shot",
        lens: "35mm",
        description: "A balanced view that captures the key spatial layout and furnishings.",
        prompt: concat!(
            "Generate a mid-room shot of this space, as if taken with a 35mm lens, to create \
             a balanced view of the key spatial layout. ",
            style_suffix!()
        ),
    },
    ShotProfile {
        name: "Desk/Surface Detail",
        lens: "50mm",
        description: "A medium detail shot focusing on specific areas like desks or work surfaces.",
        prompt: concat!(
            "Generate a detail shot of a key surface or desk area in this space, as if taken \
             with a 50mm lens. ",
            style_suffix!()
        ),
    },
    ShotProfile {
        name: "Prop/Clue Close-up",
        lens: "85mm",
        description: "A close framing of a relevant object or piece of evidence.",
        prompt: concat!(
            "Generate a close-up shot of a significant prop or clue within this space, as if \
             taken with an 85mm lens. ",
            style_suffix!()
        ),
    },
    ShotProfile {
        name: "Extreme Macro Shot",
        lens: "100mm",
        description: "Fine details such as textures, traces, or small evidence.",
        prompt: concat!(
            "Generate an extreme macro shot focusing on a fine detail like a texture, trace, \
             or small piece of evidence in this space, as if taken with a 100mm lens. ",
            style_suffix!()
        ),
    },
];

/// Returns every shot in display order.
pub fn all() -> &'static [ShotProfile] {
    &SHOT_PROFILES
}

/// Returns the shot at `index`.
pub fn get(index: usize) -> Option<&'static ShotProfile> {
    SHOT_PROFILES.get(index)
}

/// Finds a shot by name, ignoring case.
pub fn find(name: &str) -> Option<&'static ShotProfile> {
    SHOT_PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}
