use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy)]
pub struct Preset {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize, Clone, Copy)]
pub struct PoseSet {
    pub id: &'static str,
    pub label: &'static str,
    pub poses: &'static [&'static str],
}

pub const SCENES: &[Preset] = &[
    Preset {
        id: "studio-white",
        label: "White Studio",
        description: "seamless white cyclorama studio, soft diffused key light, subtle floor shadow",
    },
    Preset {
        id: "urban-street",
        label: "Urban Street",
        description: "quiet city street at golden hour, warm low sun, shallow depth of field on brick facades",
    },
    Preset {
        id: "industrial-loft",
        label: "Industrial Loft",
        description: "sunlit industrial loft with concrete floor, large steel-framed windows, neutral tones",
    },
    Preset {
        id: "runway",
        label: "Runway",
        description: "fashion show runway, dark audience area, bright overhead spotlights on the catwalk",
    },
    Preset {
        id: "garden",
        label: "Botanical Garden",
        description: "lush botanical garden path, overcast soft daylight, greenery softly blurred behind",
    },
];

pub const MODELS: &[Preset] = &[
    Preset {
        id: "female-editorial",
        label: "Female, editorial",
        description: "female fashion model in her twenties, natural makeup, shoulder-length dark hair, confident expression",
    },
    Preset {
        id: "male-editorial",
        label: "Male, editorial",
        description: "male fashion model in his late twenties, short textured hair, light stubble, neutral expression",
    },
    Preset {
        id: "androgynous",
        label: "Androgynous",
        description: "androgynous fashion model, sharp cheekbones, cropped platinum hair, calm expression",
    },
    Preset {
        id: "mature",
        label: "Mature",
        description: "elegant fashion model in their fifties, silver hair, warm relaxed expression",
    },
];

pub const POSE_SETS: &[PoseSet] = &[
    PoseSet {
        id: "catalog",
        label: "Catalog (3 shots)",
        poses: &["front view, looking at camera", "side profile, arms relaxed", "back view, head turned slightly"],
    },
    PoseSet {
        id: "editorial",
        label: "Editorial (4 shots)",
        poses: &[
            "front view, looking at camera",
            "three-quarter view, hand on hip",
            "walking towards camera, mid-stride",
            "back view, looking over shoulder",
        ],
    },
    PoseSet {
        id: "detail",
        label: "Detail (2 shots)",
        poses: &["front view, waist-up close framing on the garment", "three-quarter view, arms crossed"],
    },
];

pub const DEFAULT_POSE_SET: &str = "catalog";

fn find<'a>(list: &'a [Preset], id_or_text: &str) -> Option<&'a Preset> {
    list.iter().find(|p| p.id.eq_ignore_ascii_case(id_or_text.trim()))
}

/// Maps a scene preset id to its description; any other text is used verbatim.
pub fn resolve_scene(id_or_text: &str) -> String {
    find(SCENES, id_or_text).map(|p| p.description.to_string()).unwrap_or_else(|| id_or_text.trim().to_string())
}

pub fn resolve_model(id_or_text: &str) -> String {
    find(MODELS, id_or_text).map(|p| p.description.to_string()).unwrap_or_else(|| id_or_text.trim().to_string())
}

/// Looks up a pose set by id, case-insensitively like the scene and model presets.
pub fn pose_set(id: &str) -> Option<Vec<String>> {
    POSE_SETS.iter().find(|s| s.id.eq_ignore_ascii_case(id.trim())).map(|s| s.poses.iter().map(|p| p.to_string()).collect())
}
