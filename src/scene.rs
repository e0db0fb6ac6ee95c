use glam::DVec3;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::math::Vector4;
use crate::texture::{Texture, TextureCache};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Could not read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("Could not decode texture '{}': {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Invalid texture: {width}x{height} with {len} bytes of RGBA data")]
    InvalidTexture { width: u32, height: u32, len: usize },
}

pub type AssetResult<T> = Result<T, AssetError>;

#[derive(Clone, Debug)]
pub struct Triangle {
    pub vertices: [Vector4; 3],
    pub illumination: f64,
    // None renders with the fallback color
    pub texture: Option<Arc<Texture>>,
}

impl Triangle {
    pub fn new(vertices: [Vector4; 3]) -> Self {
        Self {
            vertices,
            illumination: 1.0,
            texture: None,
        }
    }

    pub fn with_texture(self, texture: Option<Arc<Texture>>) -> Self {
        Self { texture, ..self }
    }

    // Same surface, different corners
    pub fn with_vertices(&self, vertices: [Vector4; 3]) -> Self {
        Self {
            vertices,
            illumination: self.illumination,
            texture: self.texture.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::MAX),
        max: DVec3::splat(f64::MIN),
    };

    pub fn grow(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    // Largest side of the box
    pub fn extent(&self) -> f64 {
        (self.max - self.min).max_element()
    }
}

pub struct Mesh {
    pub triangles: Vec<Triangle>,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bounds: Bounds,
}

impl Mesh {
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        let mut bounds = Bounds::EMPTY;
        for vertex in triangles.iter().flat_map(|t| t.vertices.iter()) {
            bounds.grow(vertex.xyz());
        }
        Self {
            vertex_count: triangles.len() * 3,
            triangle_count: triangles.len(),
            triangles,
            bounds,
        }
    }

    pub fn load_obj(path: &Path) -> AssetResult<Self> {
        let source = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut textures = TextureCache::new();
        let mesh = Self::parse_obj(&source, path, &mut textures)?;

        log::info!("Loaded {}", path.display());
        log::info!("  Vertices: {}", mesh.vertex_count);
        log::info!("  Triangles: {}", mesh.triangle_count);
        log::info!("  Unique textures: {}", textures.unique_texture_count());
        log::info!(
            "  Texture data: {:.2} MiB",
            textures.total_texture_data_size() as f64 / (1024.0 * 1024.0)
        );
        Ok(mesh)
    }

    // Parses OBJ text. `path` names the file for errors and anchors relative mtllib paths.
    // Faces come out clockwise as seen from their front, which is what the renderer culls by.
    pub fn parse_obj(source: &str, path: &Path, textures: &mut TextureCache) -> AssetResult<Self> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut positions: Vec<DVec3> = Vec::new();
        let mut texcoords: Vec<(f64, f64)> = Vec::new();
        let mut materials: HashMap<String, Option<Arc<Texture>>> = HashMap::new();
        let mut current_texture: Option<Arc<Texture>> = None;
        let mut triangles = Vec::new();
        let mut bounds = Bounds::EMPTY;

        for (line_index, line) in source.lines().enumerate() {
            let line_number = line_index + 1;
            let parse_error = |message: String| AssetError::Parse {
                path: path.to_path_buf(),
                line: line_number,
                message,
            };

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };

            match keyword {
                "v" => {
                    let values = parse_floats(parts, 3).map_err(parse_error)?;
                    let position = DVec3::new(values[0], values[1], values[2]);
                    bounds.grow(position);
                    positions.push(position);
                }
                "vt" => {
                    let values = parse_floats(parts, 1).map_err(parse_error)?;
                    texcoords.push((values[0], values.get(1).copied().unwrap_or(0.0)));
                }
                "f" => {
                    let corners = parts
                        .map(|token| parse_corner(token, &positions, &texcoords))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(parse_error)?;
                    if corners.len() < 3 {
                        return Err(parse_error(format!(
                            "face needs at least 3 vertices, found {}",
                            corners.len()
                        )));
                    }
                    // Fan triangulation, each triangle reversed
                    for i in 1..corners.len() - 1 {
                        triangles.push(
                            Triangle::new([corners[0], corners[i + 1], corners[i]])
                                .with_texture(current_texture.clone()),
                        );
                    }
                }
                "mtllib" => {
                    let name = rest_of_line(line, keyword);
                    let mtl_path = base_dir.join(name);
                    materials.extend(load_materials(&mtl_path, textures)?);
                }
                "usemtl" => {
                    let name = rest_of_line(line, keyword);
                    current_texture = match materials.get(name) {
                        Some(texture) => texture.clone(),
                        None => {
                            log::warn!(
                                "{}:{}: unknown material '{}'",
                                path.display(),
                                line_number,
                                name
                            );
                            None
                        }
                    };
                }
                _ => {
                    log::debug!("Skipping OBJ directive '{}'", keyword);
                }
            }
        }

        Ok(Self {
            vertex_count: positions.len(),
            triangle_count: triangles.len(),
            triangles,
            bounds,
        })
    }
}

fn rest_of_line<'a>(line: &'a str, keyword: &str) -> &'a str {
    line[keyword.len()..].trim()
}

fn parse_floats<'a>(
    parts: impl Iterator<Item = &'a str>,
    required: usize,
) -> Result<Vec<f64>, String> {
    let values = parts
        .map(|part| {
            part.parse::<f64>()
                .map_err(|e| format!("invalid number '{}': {}", part, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() < required {
        return Err(format!(
            "expected at least {} numbers, found {}",
            required,
            values.len()
        ));
    }
    Ok(values)
}

// OBJ indices are 1-based, negative ones count back from the latest element
fn resolve_index(token: &str, len: usize) -> Result<usize, String> {
    let index: i64 = token
        .parse()
        .map_err(|e| format!("invalid index '{}': {}", token, e))?;
    let resolved = if index > 0 {
        index - 1
    } else {
        len as i64 + index
    };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(format!("index {} out of range ({} defined)", index, len));
    }
    Ok(resolved as usize)
}

// One face corner: v, v/vt, v//vn or v/vt/vn
fn parse_corner(
    token: &str,
    positions: &[DVec3],
    texcoords: &[(f64, f64)],
) -> Result<Vector4, String> {
    let mut fields = token.split('/');
    let position_index = resolve_index(fields.next().unwrap_or(""), positions.len())?;
    let p = positions[position_index];
    let vertex = Vector4::new(p.x, p.y, p.z);

    match fields.next() {
        Some(tex_token) if !tex_token.is_empty() => {
            let (u, v) = texcoords[resolve_index(tex_token, texcoords.len())?];
            Ok(vertex.with_tex(u, v))
        }
        _ => Ok(vertex),
    }
}

// Maps material names to their diffuse texture. map_Kd wins over map_Ka.
fn load_materials(
    path: &Path,
    textures: &mut TextureCache,
) -> AssetResult<HashMap<String, Option<Arc<Texture>>>> {
    let source = fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut materials = HashMap::new();
    let mut current: Option<String> = None;
    let mut has_diffuse = false;

    for (line_index, line) in source.lines().enumerate() {
        let line = line.trim();
        let Some(keyword) = line.split_whitespace().next() else {
            continue;
        };
        match keyword {
            "newmtl" => {
                let name = rest_of_line(line, keyword).to_string();
                materials.insert(name.clone(), None);
                current = Some(name);
                has_diffuse = false;
            }
            "map_Kd" | "map_Ka" => {
                let Some(name) = current.as_ref() else {
                    return Err(AssetError::Parse {
                        path: path.to_path_buf(),
                        line: line_index + 1,
                        message: format!("'{}' before any newmtl", keyword),
                    });
                };
                if keyword == "map_Ka" && has_diffuse {
                    continue;
                }
                let texture_path = base_dir.join(rest_of_line(line, keyword));
                let texture = textures.get_or_load(&texture_path)?;
                materials.insert(name.clone(), Some(texture));
                has_diffuse |= keyword == "map_Kd";
            }
            _ => {}
        }
    }

    Ok(materials)
}
