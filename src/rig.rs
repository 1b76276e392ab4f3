//! Rig binder: writes blended weights into a mesh's morph-target array.
//!
//! Rigs differ in vocabulary. A channel the mesh lacks is skipped without
//! complaint, and a mesh that is still loading is simply left alone.

use std::collections::{BTreeMap, HashMap};

/// Morph-target jaw channel names seen across common avatar exporters,
/// most specific first.
pub const JAW_ALIASES: [&str; 5] = ["JawOpen", "jawOpen", "MouthOpen", "mouthOpen", "viseme_aa"];

/// A mesh exposing named morph targets.
pub trait MorphTargets {
    /// Index of the named morph target, if the mesh has one.
    fn morph_index(&self, name: &str) -> Option<usize>;

    /// The mutable influence array, or `None` while the mesh is loading.
    fn influences_mut(&mut self) -> Option<&mut [f32]>;

    /// Write one named influence. Returns whether the mesh took it.
    fn set_influence(&mut self, name: &str, weight: f32) -> bool {
        let Some(index) = self.morph_index(name) else {
            return false;
        };
        // A dictionary pointing past the array is a broken export; skip it.
        match self.influences_mut().and_then(|slots| slots.get_mut(index)) {
            Some(slot) => {
                *slot = weight;
                true
            }
            None => false,
        }
    }
}

/// In-memory skinned mesh with a name-to-index morph dictionary.
#[derive(Debug, Clone, Default)]
pub struct MorphMesh {
    name: String,
    dictionary: HashMap<String, usize>,
    influences: Option<Vec<f32>>,
}

impl MorphMesh {
    /// A loaded mesh whose morph targets are `targets`, in index order.
    pub fn new<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mesh = Self::loading(name);
        mesh.finish_loading(targets);
        mesh
    }

    /// A mesh whose morph data has not arrived yet.
    pub fn loading(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dictionary: HashMap::new(),
            influences: None,
        }
    }

    /// Install the morph dictionary; influences start at zero.
    pub fn finish_loading<I, S>(&mut self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dictionary = targets
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.into(), i))
            .collect();
        self.influences = Some(vec![0.0; self.dictionary.len()]);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.influences.is_some()
    }

    pub fn influences(&self) -> Option<&[f32]> {
        self.influences.as_deref()
    }

    /// Current influence of a named target.
    pub fn influence(&self, name: &str) -> Option<f32> {
        let index = self.morph_index(name)?;
        self.influences.as_ref()?.get(index).copied()
    }
}

impl MorphTargets for MorphMesh {
    fn morph_index(&self, name: &str) -> Option<usize> {
        self.dictionary.get(name).copied()
    }

    fn influences_mut(&mut self) -> Option<&mut [f32]> {
        self.influences.as_deref_mut()
    }
}

/// Write every weight the mesh has a target for. Returns how many were
/// written; zero for a mesh that is still loading.
pub fn apply_weights<M>(mesh: &mut M, weights: &BTreeMap<String, f32>) -> usize
where
    M: MorphTargets + ?Sized,
{
    if mesh.influences_mut().is_none() {
        return 0;
    }
    weights
        .iter()
        .filter(|(name, weight)| mesh.set_influence(name, **weight))
        .count()
}

/// Apply the same weights to every mesh of a multi-mesh avatar.
pub fn apply_to_all<M: MorphTargets>(meshes: &mut [M], weights: &BTreeMap<String, f32>) -> usize {
    meshes.iter_mut().map(|m| apply_weights(m, weights)).sum()
}

/// Index of the first candidate name the mesh defines.
pub fn find_morph_index<M>(mesh: &M, candidates: &[&str]) -> Option<usize>
where
    M: MorphTargets + ?Sized,
{
    candidates.iter().find_map(|name| mesh.morph_index(name))
}

/// Drive a single jaw channel from a loudness level, for rigs without
/// viseme targets. Returns whether a jaw channel was found.
pub fn apply_jaw_level<M>(mesh: &mut M, level: f32) -> bool
where
    M: MorphTargets + ?Sized,
{
    let Some(index) = find_morph_index(mesh, &JAW_ALIASES) else {
        return false;
    };
    let level = if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    };
    match mesh.influences_mut().and_then(|inf| inf.get_mut(index)) {
        Some(slot) => {
            *slot = level;
            true
        }
        None => false,
    }
}
