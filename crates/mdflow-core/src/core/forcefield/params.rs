use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Wildcard type accepted in the outer positions of dihedral keys.
pub const WILDCARD: &str = "X";

/// Harmonic bond parameters, `E = k (r - r0)²`. Written as `[k, r0]`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct BondParam {
    pub k: f64,
    pub r0: f64,
}

/// Harmonic angle with an optional Urey-Bradley 1-3 term.
///
/// Written as `[k, theta0_deg]` or `[k, theta0_deg, ku, u0]`; `theta0` is stored in radians.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct AngleParam {
    pub k: f64,
    pub theta0: f64,
    pub urey_bradley: Option<UreyBradleyParam>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UreyBradleyParam {
    pub ku: f64,
    pub u0: f64,
}

/// One cosine term `k (1 + cos(n φ - δ))`. Written as `[k, n, delta_deg]`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct DihedralTerm {
    pub k: f64,
    pub periodicity: f64,
    pub phase: f64,
}

/// Harmonic out-of-plane term, `E = k (ψ - ψ0)²`. Written as `[k, psi0_deg]`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct ImproperParam {
    pub k: f64,
    pub psi0: f64,
}

/// Per-type Lennard-Jones parameters. Written as `[eps, sigma]` or `[eps, sigma, eps14, sigma14]`;
/// the 1-4 pair falls back to the regular pair when omitted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "Vec<f64>")]
pub struct NonbondedParam {
    pub epsilon: f64,
    pub sigma: f64,
    pub epsilon14: f64,
    pub sigma14: f64,
}

impl NonbondedParam {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        Self {
            epsilon,
            sigma,
            epsilon14: epsilon,
            sigma14: sigma,
        }
    }
}

fn expect_len(values: &[f64], allowed: &[usize], what: &str) -> Result<(), String> {
    if allowed.contains(&values.len()) {
        Ok(())
    } else {
        Err(format!(
            "{what} parameters need {allowed:?} values, got {}",
            values.len()
        ))
    }
}

impl TryFrom<Vec<f64>> for BondParam {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        expect_len(&values, &[2], "bond")?;
        Ok(Self {
            k: values[0],
            r0: values[1],
        })
    }
}

impl TryFrom<Vec<f64>> for AngleParam {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        expect_len(&values, &[2, 4], "angle")?;
        Ok(Self {
            k: values[0],
            theta0: values[1].to_radians(),
            urey_bradley: (values.len() == 4).then(|| UreyBradleyParam {
                ku: values[2],
                u0: values[3],
            }),
        })
    }
}

impl TryFrom<Vec<f64>> for DihedralTerm {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        expect_len(&values, &[3], "dihedral")?;
        Ok(Self {
            k: values[0],
            periodicity: values[1],
            phase: values[2].to_radians(),
        })
    }
}

impl TryFrom<Vec<f64>> for ImproperParam {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        expect_len(&values, &[2], "improper")?;
        Ok(Self {
            k: values[0],
            psi0: values[1].to_radians(),
        })
    }
}

impl TryFrom<Vec<f64>> for NonbondedParam {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        expect_len(&values, &[2, 4], "nonbonded")?;
        let mut param = Self::new(values[0], values[1]);
        if values.len() == 4 {
            param.epsilon14 = values[2];
            param.sigma14 = values[3];
        }
        Ok(param)
    }
}

/// Parameter dictionary keyed by particle-type strings such as `"C-C"` or `"C-N-C"`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ForcefieldParams {
    pub bond: HashMap<String, BondParam>,
    pub angle: HashMap<String, AngleParam>,
    pub dihedral: HashMap<String, Vec<DihedralTerm>>,
    pub improper: HashMap<String, ImproperParam>,
    pub nonbonded: HashMap<String, NonbondedParam>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Joins particle types into a dictionary key, e.g. `["C", "N"]` → `"C-N"`.
pub fn type_key(types: &[&str]) -> String {
    types.join("-")
}

impl ForcefieldParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn bond(&self, types: [&str; 2]) -> Option<&BondParam> {
        lookup_either_way(&self.bond, &types)
    }

    pub fn angle(&self, types: [&str; 3]) -> Option<&AngleParam> {
        lookup_either_way(&self.angle, &types)
    }

    /// Cosine series for a quadruple; falls back to `X-B-C-X` when no exact entry exists.
    pub fn dihedral(&self, types: [&str; 4]) -> Option<&[DihedralTerm]> {
        lookup_either_way(&self.dihedral, &types)
            .or_else(|| {
                lookup_either_way(&self.dihedral, &[WILDCARD, types[1], types[2], WILDCARD])
            })
            .map(Vec::as_slice)
    }

    pub fn improper(&self, types: [&str; 4]) -> Option<&ImproperParam> {
        lookup_either_way(&self.improper, &types)
    }

    pub fn nonbonded(&self, particle_type: &str) -> Option<&NonbondedParam> {
        self.nonbonded.get(particle_type)
    }
}

fn lookup_either_way<'a, T>(table: &'a HashMap<String, T>, types: &[&str]) -> Option<&'a T> {
    table.get(&type_key(types)).or_else(|| {
        let reversed: Vec<&str> = types.iter().rev().copied().collect();
        table.get(&type_key(&reversed))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-12;

    fn write_params(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("params.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{content}").unwrap();
        (dir, file_path)
    }

    #[test]
    fn load_succeeds_with_valid_toml() {
        let (_dir, path) = write_params(
            r#"
            [bond]
            "CT-CT" = [310.0, 1.526]

            [angle]
            "CT-CT-HC" = [50.0, 109.5]
            "HC-CT-HC" = [35.0, 109.5, 5.4, 1.802]

            [dihedral]
            "X-CT-CT-X" = [[0.156, 3.0, 0.0]]
            "HC-CT-CT-HC" = [[0.15, 3.0, 0.0], [0.25, 1.0, 180.0]]

            [improper]
            "CT-O-C-N" = [10.5, 180.0]

            [nonbonded]
            CT = [0.1094, 3.39967]
            HC = [0.0157, 2.64953, 0.01, 2.5]
            "#,
        );

        let params = ForcefieldParams::load(&path).unwrap();
        assert_eq!(params.bond.len(), 1);
        assert_eq!(
            params.bond(["CT", "CT"]),
            Some(&BondParam { k: 310.0, r0: 1.526 })
        );

        let plain = params.angle(["HC", "CT", "CT"]).unwrap();
        assert!((plain.theta0 - 109.5_f64.to_radians()).abs() < TOLERANCE);
        assert!(plain.urey_bradley.is_none());
        let with_ub = params.angle(["HC", "CT", "HC"]).unwrap();
        assert_eq!(
            with_ub.urey_bradley,
            Some(UreyBradleyParam { ku: 5.4, u0: 1.802 })
        );

        let series = params.dihedral(["HC", "CT", "CT", "HC"]).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series[1].phase - std::f64::consts::PI).abs() < TOLERANCE);

        assert!((params.improper(["CT", "O", "C", "N"]).unwrap().psi0 - std::f64::consts::PI).abs() < TOLERANCE);

        let hc = params.nonbonded("HC").unwrap();
        assert_eq!((hc.epsilon14, hc.sigma14), (0.01, 2.5));
        let ct = params.nonbonded("CT").unwrap();
        assert_eq!((ct.epsilon14, ct.sigma14), (ct.epsilon, ct.sigma));
    }

    #[test]
    fn missing_tables_default_to_empty() {
        let (_dir, path) = write_params("[bond]\n\"C-C\" = [1.0, 2.0]");
        let params = ForcefieldParams::load(&path).unwrap();
        assert!(params.angle.is_empty());
        assert!(params.nonbonded.is_empty());
    }

    #[test]
    fn load_fails_for_wrong_arity() {
        let (_dir, path) = write_params("[bond]\n\"C-C\" = [1.0, 2.0, 3.0]");
        let result = ForcefieldParams::load(&path);
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = ForcefieldParams::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn lookups_accept_reversed_keys() {
        let mut params = ForcefieldParams::default();
        params
            .bond
            .insert("C-N".to_string(), BondParam { k: 1.0, r0: 1.3 });
        params.angle.insert(
            "C-N-H".to_string(),
            AngleParam {
                k: 2.0,
                theta0: 2.0,
                urey_bradley: None,
            },
        );
        assert!(params.bond(["N", "C"]).is_some());
        assert!(params.angle(["H", "N", "C"]).is_some());
        assert!(params.angle(["N", "C", "H"]).is_none());
    }

    #[test]
    fn dihedral_lookup_falls_back_to_wildcards() {
        let mut params = ForcefieldParams::default();
        let generic = DihedralTerm {
            k: 1.0,
            periodicity: 3.0,
            phase: 0.0,
        };
        params
            .dihedral
            .insert("X-CT-N-X".to_string(), vec![generic]);

        assert_eq!(params.dihedral(["H", "CT", "N", "C"]), Some(&[generic][..]));
        assert_eq!(params.dihedral(["C", "N", "CT", "H"]), Some(&[generic][..]));
        assert!(params.dihedral(["H", "CT", "CT", "H"]).is_none());
    }
}
