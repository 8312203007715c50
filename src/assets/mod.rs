use serde::Serialize;

pub mod handler;

/// Sub-directories of the outfits directory a client may list.
pub const TRY_ON_MODES: [&str; 3] = ["upperbody", "lowerbody", "eyewear"];

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const MODEL_EXTENSIONS: [&str; 4] = ["glb", "gltf", "fbx", "vrm"];

#[derive(Debug, Serialize)]
pub struct OutfitImage {
    pub name: String,
    pub url: String,
}

/// A try-on model file; `path` is relative to the models directory.
#[derive(Debug, Serialize)]
pub struct ModelFile {
    pub name: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Glasses {
    pub id: u32,
    pub name: String,
    pub image: String,
    pub data: GlassesModel,
}

/// Scene placement for the eyewear viewer.
#[derive(Debug, Serialize)]
pub struct GlassesModel {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub model_path: String,
    pub model: &'static str,
    pub textures: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub scale: f32,
    pub up: f32,
}

impl Glasses {
    /// Catalog entry `id`, with asset URLs under `{base_url}/3dmodel/glasses-0{id}`.
    pub fn catalog_entry(id: u32, base_url: &str) -> Self {
        let folder = format!("{}/3dmodel/glasses-{:02}", base_url, id);
        Glasses {
            id,
            name: format!("Glasses {}", id),
            image: format!("{}/glasses_{:02}.png", folder, id),
            data: GlassesModel {
                kind: "gltf",
                model_path: format!("{}/scene.gltf", folder),
                model: "scene.gltf",
                textures: format!("{}/textures/texture.png", folder),
                x: 0.0,
                y: 0.3,
                z: 0.0,
                scale: 0.4,
                up: 0.0,
            },
        }
    }
}

/// Case-insensitive extension check.
pub fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && extensions.contains(&ext.to_lowercase().as_str()))
}
