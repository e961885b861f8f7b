//! Piece catalogue: shapes, rotation states, kick tables, and the INI loader.
//!
//! The catalogue is immutable after load. Each piece carries four rotation
//! states (cell offsets from the piece origin, y growing downward), an RGB
//! colour, and optionally a kick table. Kick tables come in two shapes:
//! legacy (one list per rotation direction) and per-transition (one list per
//! direction and source rotation); when both exist, per-transition wins.

use crate::config::RandType;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cell or kick offset (dx, dy), y increasing downward.
pub type Offset = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalogue: {0}")]
    Malformed(String),
}

/// Wall-kick data attached to a piece.
#[derive(Debug, Clone)]
pub enum KickTable {
    /// One offset list per rotation direction, regardless of source rotation.
    Legacy { cw: Vec<Offset>, ccw: Vec<Offset> },
    /// One offset list per (direction, source rotation).
    PerTransition {
        cw: [Vec<Offset>; 4],
        ccw: [Vec<Offset>; 4],
    },
}

impl KickTable {
    /// Offsets to try, in order, for rotating from `from_rot` in direction
    /// `dir` (+1 CW, −1 CCW). Per-transition entries win over legacy ones.
    pub fn offsets(&self, dir: i8, from_rot: u8) -> &[Offset] {
        match self {
            Self::Legacy { cw, ccw } => {
                if dir > 0 {
                    cw
                } else {
                    ccw
                }
            }
            Self::PerTransition { cw, ccw } => {
                let i = (from_rot % 4) as usize;
                if dir > 0 { &cw[i] } else { &ccw[i] }
            }
        }
    }
}

/// Immutable piece definition.
#[derive(Debug, Clone)]
pub struct PieceDef {
    pub name: String,
    /// Cell offsets for rotations 0..=3. At least one is non-empty.
    pub rotations: [Vec<Offset>; 4],
    pub color: Rgb,
    pub kicks: Option<KickTable>,
}

impl PieceDef {
    /// Cells for a rotation state; out-of-range indices reduce modulo 4.
    pub fn cells(&self, rot: u8) -> &[Offset] {
        &self.rotations[(rot % 4) as usize]
    }
}

/// `[randomizer]` section of the piece file; overrides the config record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandSection {
    pub rand_type: Option<RandType>,
    pub bag_size: Option<usize>,
}

/// The loaded piece catalogue, shared read-only after startup.
#[derive(Debug, Clone)]
pub struct Catalogue {
    pieces: Vec<PieceDef>,
}

impl Catalogue {
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn get(&self, index: usize) -> &PieceDef {
        &self.pieces[index]
    }

    pub fn pieces(&self) -> &[PieceDef] {
        &self.pieces
    }

    /// Load from a piece file.
    pub fn load(path: &Path) -> Result<(Self, RandSection), CatalogueError> {
        let s = std::fs::read_to_string(path)?;
        Self::parse(&s)
    }

    /// Parse the line-based INI piece format: `[piece.NAME]` sections with
    /// `BASE`/`ROT0..ROT3`/`COLOR`/kick keys plus an optional `[randomizer]`
    /// section. Fails with `Malformed` when no piece ends up with a
    /// non-empty rotation state.
    pub fn parse(s: &str) -> Result<(Self, RandSection), CatalogueError> {
        let mut pieces: Vec<PieceBuilder> = Vec::new();
        let mut rand = RandSection::default();
        let mut in_randomizer = false;

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let section = section.trim();
                if section.eq_ignore_ascii_case("randomizer") {
                    in_randomizer = true;
                } else if let Some(name) = section
                    .strip_prefix("piece.")
                    .or_else(|| section.strip_prefix("PIECE."))
                    .or_else(|| section.strip_prefix("Piece."))
                {
                    in_randomizer = false;
                    pieces.push(PieceBuilder::new(name.trim()));
                } else {
                    in_randomizer = false;
                }
                continue;
            }
            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim().to_ascii_uppercase();
            let value = line[eq + 1..].trim();
            if in_randomizer {
                match key.as_str() {
                    "TYPE" => {
                        rand.rand_type = match value.to_ascii_lowercase().as_str() {
                            "simple" => Some(RandType::Simple),
                            "bag" => Some(RandType::Bag),
                            _ => None,
                        };
                    }
                    "BAGSIZE" => rand.bag_size = value.parse().ok(),
                    _ => {}
                }
            } else if let Some(builder) = pieces.last_mut() {
                builder.apply(&key, value)?;
            }
        }

        let catalogue = Self {
            pieces: pieces.into_iter().map(PieceBuilder::finish).collect(),
        };
        if catalogue.is_empty()
            || !catalogue.pieces.iter().any(|p| p.rotations.iter().any(|r| !r.is_empty()))
        {
            return Err(CatalogueError::Malformed(
                "no piece has a non-empty rotation state".into(),
            ));
        }
        Ok((catalogue, rand))
    }

    /// Canonical seven-piece fallback with standard colours and SRS kicks.
    pub fn fallback() -> Self {
        let jlstz = || KickTable::PerTransition {
            cw: JLSTZ_CW.map(|k| k.to_vec()),
            ccw: JLSTZ_CCW.map(|k| k.to_vec()),
        };
        let pieces = vec![
            PieceDef {
                name: "I".into(),
                rotations: [
                    vec![(0, 1), (1, 1), (2, 1), (3, 1)],
                    vec![(2, 0), (2, 1), (2, 2), (2, 3)],
                    vec![(0, 2), (1, 2), (2, 2), (3, 2)],
                    vec![(1, 0), (1, 1), (1, 2), (1, 3)],
                ],
                color: Rgb::new(0x00, 0xFF, 0xFF),
                kicks: Some(KickTable::PerTransition {
                    cw: I_CW.map(|k| k.to_vec()),
                    ccw: I_CCW.map(|k| k.to_vec()),
                }),
            },
            PieceDef {
                name: "O".into(),
                rotations: std::array::from_fn(|_| vec![(1, 0), (2, 0), (1, 1), (2, 1)]),
                color: Rgb::new(0xFF, 0xFF, 0x00),
                kicks: None,
            },
            PieceDef {
                name: "T".into(),
                rotations: [
                    vec![(1, 0), (0, 1), (1, 1), (2, 1)],
                    vec![(1, 0), (1, 1), (2, 1), (1, 2)],
                    vec![(0, 1), (1, 1), (2, 1), (1, 2)],
                    vec![(1, 0), (0, 1), (1, 1), (1, 2)],
                ],
                color: Rgb::new(0xAA, 0x00, 0xFF),
                kicks: Some(jlstz()),
            },
            PieceDef {
                name: "S".into(),
                rotations: [
                    vec![(1, 0), (2, 0), (0, 1), (1, 1)],
                    vec![(1, 0), (1, 1), (2, 1), (2, 2)],
                    vec![(1, 1), (2, 1), (0, 2), (1, 2)],
                    vec![(0, 0), (0, 1), (1, 1), (1, 2)],
                ],
                color: Rgb::new(0x00, 0xFF, 0x00),
                kicks: Some(jlstz()),
            },
            PieceDef {
                name: "Z".into(),
                rotations: [
                    vec![(0, 0), (1, 0), (1, 1), (2, 1)],
                    vec![(2, 0), (1, 1), (2, 1), (1, 2)],
                    vec![(0, 1), (1, 1), (1, 2), (2, 2)],
                    vec![(1, 0), (0, 1), (1, 1), (0, 2)],
                ],
                color: Rgb::new(0xFF, 0x00, 0x00),
                kicks: Some(jlstz()),
            },
            PieceDef {
                name: "L".into(),
                rotations: [
                    vec![(2, 0), (0, 1), (1, 1), (2, 1)],
                    vec![(1, 0), (1, 1), (1, 2), (2, 2)],
                    vec![(0, 1), (1, 1), (2, 1), (0, 2)],
                    vec![(0, 0), (1, 0), (1, 1), (1, 2)],
                ],
                color: Rgb::new(0xFF, 0x7F, 0x00),
                kicks: Some(jlstz()),
            },
            PieceDef {
                name: "J".into(),
                rotations: [
                    vec![(0, 0), (0, 1), (1, 1), (2, 1)],
                    vec![(1, 0), (2, 0), (1, 1), (1, 2)],
                    vec![(0, 1), (1, 1), (2, 1), (2, 2)],
                    vec![(1, 0), (1, 1), (0, 2), (1, 2)],
                ],
                color: Rgb::new(0x00, 0x00, 0xFF),
                kicks: Some(jlstz()),
            },
        ];
        Self { pieces }
    }
}

/// SRS kick offsets for J/L/S/T/Z, clockwise, indexed by source rotation.
const JLSTZ_CW: [[Offset; 5]; 4] = [
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 0→1
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1→2
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 2→3
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3→0
];

/// SRS kick offsets for J/L/S/T/Z, counter-clockwise, indexed by source rotation.
const JLSTZ_CCW: [[Offset; 5]; 4] = [
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 0→3
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1→0
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 2→1
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3→2
];

const I_CW: [[Offset; 5]; 4] = [
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 0→1
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 1→2
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 2→3
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 3→0
];

const I_CCW: [[Offset; 5]; 4] = [
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 0→3
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 1→0
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 2→1
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 3→2
];

/// Default catalogue path tried when neither the environment variable nor the
/// configuration names one.
pub const DEFAULT_PIECES_PATH: &str = "pieces.cfg";

/// Resolve and load the catalogue: `DROPBLOCKS_PIECES` env var, then the
/// explicit config path, then `pieces.cfg` in the CWD, then the internal
/// fallback. Load failures warn and fall back rather than abort.
pub fn load_catalogue(explicit: Option<&Path>) -> (Catalogue, RandSection, Vec<String>) {
    let mut warnings = Vec::new();
    let env_path = std::env::var_os("DROPBLOCKS_PIECES").map(PathBuf::from);
    let path = env_path
        .as_deref()
        .or(explicit)
        .map(Path::to_path_buf)
        .or_else(|| {
            let p = PathBuf::from(DEFAULT_PIECES_PATH);
            p.exists().then_some(p)
        });
    let Some(path) = path else {
        return (Catalogue::fallback(), RandSection::default(), warnings);
    };
    match Catalogue::load(&path) {
        Ok((cat, rand)) => (cat, rand, warnings),
        Err(e) => {
            warnings.push(format!(
                "piece catalogue {}: {e}; using built-in pieces",
                path.display()
            ));
            (Catalogue::fallback(), RandSection::default(), warnings)
        }
    }
}

/// Rotation-state source while a piece section is being read.
#[derive(Debug, Clone)]
enum RotSpec {
    Cells(Vec<Offset>),
    SameAs(usize),
}

#[derive(Debug)]
struct PieceBuilder {
    name: String,
    color: Rgb,
    auto_rotations: bool,
    base: Option<Vec<Offset>>,
    rots: [Option<RotSpec>; 4],
    legacy_cw: Option<Vec<Offset>>,
    legacy_ccw: Option<Vec<Offset>>,
    trans_cw: [Option<Vec<Offset>>; 4],
    trans_ccw: [Option<Vec<Offset>>; 4],
}

impl PieceBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: Rgb::new(0xC0, 0xC0, 0xC0),
            auto_rotations: false,
            base: None,
            rots: [const { None }; 4],
            legacy_cw: None,
            legacy_ccw: None,
            trans_cw: [const { None }; 4],
            trans_ccw: [const { None }; 4],
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), CatalogueError> {
        match key {
            "COLOR" => self.color = parse_hex(value)?,
            "ROTATIONS" => self.auto_rotations = value.eq_ignore_ascii_case("auto"),
            "BASE" => self.base = Some(parse_offsets(value)?),
            "ROT0" | "ROT1" | "ROT2" | "ROT3" => {
                let i = (key.as_bytes()[3] - b'0') as usize;
                self.rots[i] = Some(if let Some(src) = value.strip_prefix("sameas:") {
                    let src = src.trim();
                    let idx = src
                        .strip_prefix("rot")
                        .and_then(|n| n.parse::<usize>().ok())
                        .filter(|&n| n < 4)
                        .ok_or_else(|| {
                            CatalogueError::Malformed(format!(
                                "{}: {key}: bad sameas target '{src}'",
                                self.name
                            ))
                        })?;
                    RotSpec::SameAs(idx)
                } else {
                    RotSpec::Cells(parse_offsets(value)?)
                });
            }
            "KICKS.CW" => self.legacy_cw = Some(parse_offsets(value)?),
            "KICKS.CCW" => self.legacy_ccw = Some(parse_offsets(value)?),
            _ if key.starts_with("KICKS.CW.") || key.starts_with("KICKS.CCW.") => {
                let (cw, trans) = if let Some(t) = key.strip_prefix("KICKS.CW.") {
                    (true, t)
                } else {
                    (false, &key["KICKS.CCW.".len()..])
                };
                let (from, to) = parse_transition(trans).ok_or_else(|| {
                    CatalogueError::Malformed(format!("{}: bad kick transition '{key}'", self.name))
                })?;
                let expected = if cw { (from + 1) % 4 } else { (from + 3) % 4 };
                if to != expected {
                    return Err(CatalogueError::Malformed(format!(
                        "{}: transition {from}TO{to} does not match direction",
                        self.name
                    )));
                }
                let offsets = parse_offsets(value)?;
                if cw {
                    self.trans_cw[from] = Some(offsets);
                } else {
                    self.trans_ccw[from] = Some(offsets);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> PieceDef {
        let mut rotations: [Vec<Offset>; 4] = [const { Vec::new() }; 4];
        if let Some(base) = &self.base {
            rotations[0] = base.clone();
            if self.auto_rotations || self.rots.iter().all(Option::is_none) {
                for i in 1..4 {
                    rotations[i] = rotate_quarter(&rotations[i - 1]);
                }
            }
        }
        // Explicit states override synthesised ones; sameas resolves against
        // whatever the referenced slot holds at that point.
        for i in 0..4 {
            match &self.rots[i] {
                Some(RotSpec::Cells(cells)) => rotations[i] = cells.clone(),
                Some(RotSpec::SameAs(src)) => rotations[i] = rotations[*src].clone(),
                None => {}
            }
        }

        let has_trans = self.trans_cw.iter().chain(&self.trans_ccw).any(Option::is_some);
        let kicks = if has_trans {
            // Missing transitions default to the identity kick.
            Some(KickTable::PerTransition {
                cw: self.trans_cw.map(|k| k.unwrap_or_else(|| vec![(0, 0)])),
                ccw: self.trans_ccw.map(|k| k.unwrap_or_else(|| vec![(0, 0)])),
            })
        } else if self.legacy_cw.is_some() || self.legacy_ccw.is_some() {
            Some(KickTable::Legacy {
                cw: self.legacy_cw.unwrap_or_else(|| vec![(0, 0)]),
                ccw: self.legacy_ccw.unwrap_or_else(|| vec![(0, 0)]),
            })
        } else {
            None
        };

        PieceDef {
            name: self.name,
            rotations,
            color: self.color,
            kicks,
        }
    }
}

/// 90° clockwise in grid coordinates: (x, y) ↦ (−y, x).
fn rotate_quarter(cells: &[Offset]) -> Vec<Offset> {
    cells.iter().map(|&(x, y)| (-y, x)).collect()
}

/// Parse "0TO1" → (0, 1).
fn parse_transition(s: &str) -> Option<(usize, usize)> {
    let s = s.to_ascii_uppercase();
    let (from, to) = s.split_once("TO")?;
    let from: usize = from.trim().parse().ok()?;
    let to: usize = to.trim().parse().ok()?;
    (from < 4 && to < 4).then_some((from, to))
}

/// Parse "(x,y);(x,y);…" into offsets.
fn parse_offsets(s: &str) -> Result<Vec<Offset>, CatalogueError> {
    let mut out = Vec::new();
    for part in s.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let inner = part
            .strip_prefix('(')
            .and_then(|p| p.strip_suffix(')'))
            .ok_or_else(|| CatalogueError::Malformed(format!("bad offset '{part}'")))?;
        let (x, y) = inner
            .split_once(',')
            .ok_or_else(|| CatalogueError::Malformed(format!("bad offset '{part}'")))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| CatalogueError::Malformed(format!("bad offset '{part}'")))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| CatalogueError::Malformed(format!("bad offset '{part}'")))?;
        out.push((x, y));
    }
    Ok(out)
}

/// Parse "#RRGGBB" into an RGB triple.
fn parse_hex(s: &str) -> Result<Rgb, CatalogueError> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 {
        return Err(CatalogueError::Malformed(format!("bad colour '#{s}'")));
    }
    let byte = |r: std::ops::Range<usize>| {
        u8::from_str_radix(&s[r], 16)
            .map_err(|_| CatalogueError::Malformed(format!("bad colour '#{s}'")))
    };
    Ok(Rgb::new(byte(0..2)?, byte(2..4)?, byte(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_has_seven_pieces() {
        let cat = Catalogue::fallback();
        assert_eq!(cat.len(), 7);
        let names: Vec<&str> = cat.pieces().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["I", "O", "T", "S", "Z", "L", "J"]);
        for p in cat.pieces() {
            for r in 0..4 {
                assert_eq!(p.cells(r).len(), 4, "{} rot {r}", p.name);
            }
        }
    }

    #[test]
    fn test_fallback_t_kicks_2to3() {
        let cat = Catalogue::fallback();
        let t = cat.get(2);
        let kicks = t.kicks.as_ref().unwrap();
        assert_eq!(
            kicks.offsets(1, 2),
            [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)]
        );
    }

    #[test]
    fn test_rotation_index_reduced_modulo_4() {
        let cat = Catalogue::fallback();
        assert_eq!(cat.get(0).cells(5), cat.get(0).cells(1));
    }

    #[test]
    fn test_parse_explicit_rotations_and_sameas() {
        let src = "\
[piece.duo]
COLOR=#112233
ROTATIONS=explicit
ROT0=(0,0);(1,0)
ROT1=(0,0);(0,1)
ROT2=sameas:rot0
ROT3=sameas:rot1
";
        let (cat, _) = Catalogue::parse(src).unwrap();
        assert_eq!(cat.len(), 1);
        let p = cat.get(0);
        assert_eq!(p.color, Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(p.cells(0), p.cells(2));
        assert_eq!(p.cells(1), p.cells(3));
        assert_ne!(p.cells(0), p.cells(1));
    }

    #[test]
    fn test_parse_auto_rotations_synthesised() {
        let src = "\
[piece.bar]
COLOR=#FF0000
ROTATIONS=auto
BASE=(0,0);(1,0);(2,0)
";
        let (cat, _) = Catalogue::parse(src).unwrap();
        let p = cat.get(0);
        // (x, y) ↦ (−y, x)
        assert_eq!(p.cells(1), [(0, 0), (0, 1), (0, 2)]);
        assert_eq!(p.cells(2), [(0, 0), (-1, 0), (-2, 0)]);
    }

    #[test]
    fn test_parse_kick_tables() {
        let src = "\
[piece.k]
BASE=(0,0)
KICKS.CW=(0,0);(-1,0)
KICKS.CCW=(0,0);(1,0)
KICKS.CW.0TO1=(0,0);(-2,0)
";
        let (cat, _) = Catalogue::parse(src).unwrap();
        let kicks = cat.get(0).kicks.as_ref().unwrap();
        // Per-transition presence wins over legacy entirely.
        assert!(matches!(kicks, KickTable::PerTransition { .. }));
        assert_eq!(kicks.offsets(1, 0), [(0, 0), (-2, 0)]);
        // Unspecified transitions default to the identity kick.
        assert_eq!(kicks.offsets(1, 1), [(0, 0)]);
    }

    #[test]
    fn test_parse_randomizer_section() {
        let src = "\
[piece.x]
BASE=(0,0)
[randomizer]
TYPE=bag
BAGSIZE=5
";
        let (_, rand) = Catalogue::parse(src).unwrap();
        assert_eq!(rand.rand_type, Some(RandType::Bag));
        assert_eq!(rand.bag_size, Some(5));
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        assert!(matches!(
            Catalogue::parse("; nothing here\n"),
            Err(CatalogueError::Malformed(_))
        ));
        assert!(matches!(
            Catalogue::parse("[piece.ghost]\nCOLOR=#000000\n"),
            Err(CatalogueError::Malformed(_))
        ));
    }

    #[test]
    fn test_mismatched_transition_rejected() {
        let src = "[piece.k]\nBASE=(0,0)\nKICKS.CW.0TO2=(0,0)\n";
        assert!(Catalogue::parse(src).is_err());
    }
}
