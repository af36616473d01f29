use serde::{Deserialize, Serialize};

/// Keyframe animation container attached to an object or node graph,
/// mirroring the host's action / f-curve / keyframe hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub fcurves: Vec<FCurve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FCurve {
    pub data_path: String,
    pub array_index: usize,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: i32,
    pub value: f32,
    #[serde(default)]
    pub interpolation: Interpolation,
}

/// The host's default easing is Bezier; turntables force Linear because the
/// eased start and stop read as a mechanical stutter on a looping rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Bezier,
    Linear,
}

impl Action {
    pub fn fcurve(&self, data_path: &str, array_index: usize) -> Option<&FCurve> {
        self.fcurves.iter().find(|fc| fc.data_path == data_path && fc.array_index == array_index)
    }

    fn fcurve_entry(&mut self, data_path: &str, array_index: usize) -> &mut FCurve {
        let position = self
            .fcurves
            .iter()
            .position(|fc| fc.data_path == data_path && fc.array_index == array_index);
        match position {
            Some(idx) => &mut self.fcurves[idx],
            None => {
                self.fcurves.push(FCurve {
                    data_path: data_path.to_string(),
                    array_index,
                    keyframes: Vec::new(),
                });
                self.fcurves.last_mut().expect("fcurve just pushed")
            }
        }
    }

    /// Inserts a key, replacing any existing key at the same frame.
    pub fn keyframe_insert(&mut self, data_path: &str, array_index: usize, frame: i32, value: f32) {
        let curve = self.fcurve_entry(data_path, array_index);
        match curve.keyframes.binary_search_by_key(&frame, |kf| kf.frame) {
            Ok(idx) => curve.keyframes[idx].value = value,
            Err(idx) => curve.keyframes.insert(
                idx,
                Keyframe { frame, value, interpolation: Interpolation::default() },
            ),
        }
    }

    /// Forces linear interpolation on every key of every curve.
    pub fn set_linear_interpolation(&mut self) {
        for curve in &mut self.fcurves {
            for key in &mut curve.keyframes {
                key.interpolation = Interpolation::Linear;
            }
        }
    }
}

impl FCurve {
    /// Samples the curve at a frame. Linear between keys, constant beyond
    /// the first and last key. Bezier keys are approximated linearly; the
    /// preview pipeline only ever emits linear keys.
    pub fn evaluate(&self, frame: f32) -> f32 {
        match self.keyframes.as_slice() {
            [] => 0.0,
            [only] => only.value,
            keys => {
                let first = keys.first().expect("non-empty keyframes");
                let last = keys.last().expect("non-empty keyframes");
                if frame <= first.frame as f32 {
                    return first.value;
                }
                if frame >= last.frame as f32 {
                    return last.value;
                }
                let upper = keys
                    .iter()
                    .position(|kf| kf.frame as f32 >= frame)
                    .expect("frame within key range");
                let hi = keys[upper];
                let lo = keys[upper - 1];
                let span = (hi.frame - lo.frame) as f32;
                let t = (frame - lo.frame as f32) / span;
                lo.value + (hi.value - lo.value) * t
            }
        }
    }
}
