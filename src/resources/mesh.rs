//! Mesh data structures and generation
//!
//! Generators are Z-up: planes lie in XY with +Z normals and cylinders
//! extend along Z.

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::f32::consts::PI;

/// Stable mesh identity, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

fn vertex(position: Vec3, normal: Vec3, uv: Vec2, tangent: Vec4) -> Vertex {
    Vertex {
        position,
        normal,
        uv,
        tangent,
    }
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Flip winding and normals so the surface is seen from inside
    pub fn invert_faces(mut self) -> Self {
        for triangle in self.indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
        for v in &mut self.vertices {
            v.normal = -v.normal;
        }
        self
    }

    /// Append another mesh transformed by `transform`
    pub fn append(&mut self, other: &Mesh, transform: Mat4) {
        let base = self.vertices.len() as u32;
        let normal_matrix = transform.inverse().transpose();
        self.vertices.extend(other.vertices.iter().map(|v| Vertex {
            position: transform.transform_point3(v.position),
            normal: normal_matrix.transform_vector3(v.normal).normalize_or_zero(),
            uv: v.uv,
            tangent: transform
                .transform_vector3(v.tangent.truncate())
                .normalize_or_zero()
                .extend(v.tangent.w),
        }));
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        // (normal, u axis, v axis) per face
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];

        for (normal, u_axis, v_axis) in faces {
            let base = mesh.vertices.len() as u32;
            let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
            for (u, v) in corners {
                mesh.vertices.push(vertex(
                    normal * 0.5 + u_axis * u + v_axis * v,
                    normal,
                    Vec2::new(u + 0.5, 0.5 - v),
                    u_axis.extend(1.0),
                ));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Create a UV sphere of radius 0.5 with poles on the Z axis
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");

        let segment_angle = 2.0 * PI / segments as f32;
        let ring_angle = PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let z = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), ring_radius * theta.sin(), z);

                mesh.vertices.push(vertex(
                    normal * 0.5,
                    normal.normalize_or_zero(),
                    Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                    Vec4::new(-theta.sin(), theta.cos(), 0.0, 1.0),
                ));
            }
        }

        // Counter-clockwise seen from outside
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Create a plane in XY facing +Z
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = Mesh::new("plane");
        let subdivisions = subdivisions.max(1);

        let step_x = width / subdivisions as f32;
        let step_y = depth / subdivisions as f32;

        for y in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.vertices.push(vertex(
                    Vec3::new(-width / 2.0 + x as f32 * step_x, -depth / 2.0 + y as f32 * step_y, 0.0),
                    Vec3::Z,
                    Vec2::new(x as f32 / subdivisions as f32, 1.0 - y as f32 / subdivisions as f32),
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                ));
            }
        }

        for y in 0..subdivisions {
            for x in 0..subdivisions {
                let current = y * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }

    /// Create a closed cylinder along Z, centered at origin
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let mut mesh = Mesh::new("cylinder");

        let half_height = height / 2.0;
        let angle_step = 2.0 * PI / segments as f32;

        for i in 0..=segments {
            let angle = i as f32 * angle_step;
            let normal = Vec3::new(angle.cos(), angle.sin(), 0.0);
            let tangent = Vec4::new(-angle.sin(), angle.cos(), 0.0, 1.0);
            let u = i as f32 / segments as f32;

            mesh.vertices.push(vertex(normal * radius - Vec3::Z * half_height, normal, Vec2::new(u, 1.0), tangent));
            mesh.vertices.push(vertex(normal * radius + Vec3::Z * half_height, normal, Vec2::new(u, 0.0), tangent));
        }

        for i in 0..segments {
            let base = i * 2;
            mesh.indices
                .extend_from_slice(&[base, base + 2, base + 1, base + 1, base + 2, base + 3]);
        }

        for (z, normal) in [(half_height, Vec3::Z), (-half_height, -Vec3::Z)] {
            let center = mesh.vertices.len() as u32;
            mesh.vertices.push(vertex(
                Vec3::new(0.0, 0.0, z),
                normal,
                Vec2::splat(0.5),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
            ));
            for i in 0..=segments {
                let angle = i as f32 * angle_step;
                mesh.vertices.push(vertex(
                    Vec3::new(angle.cos() * radius, angle.sin() * radius, z),
                    normal,
                    Vec2::new(0.5 + angle.cos() * 0.5, 0.5 + angle.sin() * 0.5),
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                ));
            }
            for i in 0..segments {
                let a = center + 1 + i;
                if normal.z > 0.0 {
                    mesh.indices.extend_from_slice(&[center, a, a + 1]);
                } else {
                    mesh.indices.extend_from_slice(&[center, a + 1, a]);
                }
            }
        }

        mesh
    }

    /// A building brick `studs_x` by `studs_y` units with studs on top
    pub fn brick(studs_x: u32, studs_y: u32) -> Self {
        let (sx, sy) = (studs_x.max(1) as f32, studs_y.max(1) as f32);
        let body_height = 1.2;

        let mut mesh = Mesh::new("brick");
        mesh.append(
            &Mesh::cube(),
            Mat4::from_scale_rotation_translation(
                Vec3::new(sx, sy, body_height),
                glam::Quat::IDENTITY,
                Vec3::new(0.0, 0.0, body_height / 2.0),
            ),
        );

        let stud = Mesh::cylinder(0.3, 0.2, 16);
        for ix in 0..studs_x.max(1) {
            for iy in 0..studs_y.max(1) {
                let offset = Vec3::new(
                    ix as f32 - (sx - 1.0) / 2.0,
                    iy as f32 - (sy - 1.0) / 2.0,
                    body_height + 0.1,
                );
                mesh.append(&stud, Mat4::from_translation(offset));
            }
        }
        mesh
    }
}

/// Registry of CPU-side meshes
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: Vec<Mesh>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mesh: Mesh) -> MeshId {
        let id = MeshId(self.meshes.len() as u32);
        self.meshes.push(mesh);
        id
    }

    pub fn get(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// GPU resources for a mesh
#[derive(Debug, Clone, Copy)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(backend: &mut dyn GraphicsBackend, mesh: &Mesh) -> BackendResult<Self> {
        let vertex_data = mesh.vertex_bytes();
        let index_data = mesh.index_bytes();

        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Vertices", mesh.name)),
                size: vertex_data.len() as u64,
                usage: BufferUsage::VERTEX,
            },
            vertex_data,
        )?;

        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} Indices", mesh.name)),
                size: index_data.len() as u64,
                usage: BufferUsage::INDEX,
            },
            index_data,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(mesh: &Mesh, triangle: usize) -> Vec3 {
        let i = &mesh.indices[triangle * 3..triangle * 3 + 3];
        let a = mesh.vertices[i[0] as usize].position;
        let b = mesh.vertices[i[1] as usize].position;
        let c = mesh.vertices[i[2] as usize].position;
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for t in 0..cube.triangle_count() {
            let stored = cube.vertices[cube.indices[t * 3] as usize].normal;
            assert!(triangle_normal(&cube, t).dot(stored) > 0.99);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = Mesh::plane(2.0, 2.0, 2);
        assert_eq!(plane.triangle_count(), 8);
        assert!(triangle_normal(&plane, 0).dot(Vec3::Z) > 0.99);
    }

    #[test]
    fn test_invert_faces_flips_winding() {
        let sphere = Mesh::sphere(8, 8);
        let t = 20;
        let before = triangle_normal(&sphere, t);
        let inverted = sphere.invert_faces();
        assert!(triangle_normal(&inverted, t).dot(before) < -0.99);
    }

    #[test]
    fn test_brick_appends_studs() {
        let brick = Mesh::brick(2, 4);
        let cube = Mesh::cube();
        let stud = Mesh::cylinder(0.3, 0.2, 16);
        assert_eq!(brick.vertex_count(), cube.vertex_count() + 8 * stud.vertex_count());
        assert!(brick.indices.iter().all(|&i| (i as usize) < brick.vertex_count()));
    }
}
