//! Light storage and GPU light buffer layout.
//!
//! Point lights are kept densely packed so the light buffer can be uploaded
//! in one write. Destroying a light moves the last light into the hole; the
//! owner of the moved light is told its new index.
//!
//! # Buffer layout
//!
//! ```text
//! offset 0                       LightBufferHeader
//! offset size_of::<Header>()     PointLightData[capacity]
//! ```

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::resources::Buffer;

/// Entity that owns a light, as known to the caller.
pub type LightOwner = u64;

/// Index of a point light in the dense light array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointLightIndex(pub u32);

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World-space position.
    pub position: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity in candela.
    pub intensity: f32,
    /// Maximum range. Zero means infinite.
    pub range: f32,
}

impl PointLight {
    /// Create a white light with infinite range.
    pub fn new(position: Vec3, intensity: f32) -> Self {
        Self {
            position,
            color: Vec3::ONE,
            intensity,
            range: 0.0,
        }
    }

    /// Set the color.
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Set the maximum range.
    #[must_use]
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    fn data(&self) -> PointLightData {
        PointLightData {
            position_range: self.position.extend(self.range).to_array(),
            color_intensity: self.color.extend(self.intensity).to_array(),
        }
    }
}

/// A directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    /// Illuminance in lux.
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
            intensity: 0.0,
        }
    }
}

/// GPU layout of one point light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    /// xyz = position, w = range.
    pub position_range: [f32; 4],
    /// xyz = color, w = intensity.
    pub color_intensity: [f32; 4],
}

/// GPU layout of the light buffer header.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBufferHeader {
    /// xyz = normalized direction, w unused.
    pub directional_direction: [f32; 4],
    /// xyz = color, w = intensity.
    pub directional_color_intensity: [f32; 4],
    /// Number of valid entries in the point light array.
    pub point_light_count: u32,
    /// Padding to 16 bytes.
    pub _pad: [u32; 3],
}

static_assertions::const_assert_eq!(std::mem::size_of::<PointLightData>(), 32);
static_assertions::const_assert_eq!(std::mem::size_of::<LightBufferHeader>(), 48);

/// Where a light was moved by a swap-remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightRelocation {
    /// Owner of the moved light.
    pub owner: LightOwner,
    /// The light's new index.
    pub index: PointLightIndex,
}

/// Dense storage of the scene's lights.
#[derive(Debug)]
pub struct LightManager {
    capacity: u32,
    point_lights: Vec<PointLightData>,
    owners: Vec<LightOwner>,
    directional: DirectionalLight,
}

impl LightManager {
    /// Create a manager for at most `capacity` point lights.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            point_lights: Vec::new(),
            owners: Vec::new(),
            directional: DirectionalLight::default(),
        }
    }

    /// Size in bytes of a light buffer for `capacity` point lights.
    pub fn buffer_size(capacity: u32) -> u64 {
        (std::mem::size_of::<LightBufferHeader>()
            + capacity as usize * std::mem::size_of::<PointLightData>()) as u64
    }

    /// Add a point light owned by `owner`.
    pub fn create_point_light(
        &mut self,
        owner: LightOwner,
        light: &PointLight,
    ) -> Result<PointLightIndex, GraphicsError> {
        if self.point_lights.len() as u32 >= self.capacity {
            return Err(GraphicsError::InvalidParameter(format!(
                "point light capacity {} reached",
                self.capacity
            )));
        }
        self.point_lights.push(light.data());
        self.owners.push(owner);
        Ok(PointLightIndex(self.point_lights.len() as u32 - 1))
    }

    /// Replace the data of a point light.
    pub fn update_point_light(
        &mut self,
        index: PointLightIndex,
        light: &PointLight,
    ) -> Result<(), GraphicsError> {
        let slot = self
            .point_lights
            .get_mut(index.0 as usize)
            .ok_or_else(|| Self::unknown(index))?;
        *slot = light.data();
        Ok(())
    }

    /// Remove a point light by moving the last light into its place.
    ///
    /// Returns the relocation of the moved light, or `None` if the removed
    /// light was the last one.
    pub fn destroy_point_light(
        &mut self,
        index: PointLightIndex,
    ) -> Result<Option<LightRelocation>, GraphicsError> {
        let position = index.0 as usize;
        if position >= self.point_lights.len() {
            return Err(Self::unknown(index));
        }
        self.point_lights.swap_remove(position);
        self.owners.swap_remove(position);
        Ok(self.owners.get(position).map(|&owner| LightRelocation {
            owner,
            index,
        }))
    }

    /// Owner of a point light.
    pub fn owner(&self, index: PointLightIndex) -> Option<LightOwner> {
        self.owners.get(index.0 as usize).copied()
    }

    /// Point light data in index order.
    pub fn point_lights(&self) -> &[PointLightData] {
        &self.point_lights
    }

    /// Number of point lights.
    pub fn point_light_count(&self) -> u32 {
        self.point_lights.len() as u32
    }

    /// Point light capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Set the directional light.
    pub fn set_directional_light(&mut self, light: DirectionalLight) {
        self.directional = light;
    }

    /// The directional light.
    pub fn directional_light(&self) -> &DirectionalLight {
        &self.directional
    }

    /// Header for the current contents.
    pub fn header(&self) -> LightBufferHeader {
        LightBufferHeader {
            directional_direction: self
                .directional
                .direction
                .normalize_or_zero()
                .extend(0.0)
                .to_array(),
            directional_color_intensity: self
                .directional
                .color
                .extend(self.directional.intensity)
                .to_array(),
            point_light_count: self.point_light_count(),
            _pad: [0; 3],
        }
    }

    /// Upload header and point lights into a light buffer.
    pub fn write_to(&self, ctx: &RenderContext, buffer: &Buffer) -> Result<(), GraphicsError> {
        let header = self.header();
        buffer.set_data(ctx, bytemuck::bytes_of(&header), 0)?;
        buffer.set_data(
            ctx,
            bytemuck::cast_slice(&self.point_lights),
            std::mem::size_of::<LightBufferHeader>() as u64,
        )
    }

    fn unknown(index: PointLightIndex) -> GraphicsError {
        GraphicsError::InvalidParameter(format!("no point light at index {}", index.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(x: f32) -> PointLight {
        PointLight::new(Vec3::new(x, 0.0, 0.0), 1.0)
    }

    #[test]
    fn test_swap_remove_reports_moved_owner() {
        let mut lights = LightManager::new(8);
        lights.create_point_light(10, &light(0.0)).unwrap();
        lights.create_point_light(11, &light(1.0)).unwrap();
        lights.create_point_light(12, &light(2.0)).unwrap();

        let moved = lights.destroy_point_light(PointLightIndex(0)).unwrap();
        assert_eq!(
            moved,
            Some(LightRelocation {
                owner: 12,
                index: PointLightIndex(0)
            })
        );
        assert_eq!(lights.point_light_count(), 2);
        assert_eq!(lights.point_lights()[0].position_range[0], 2.0);
        assert_eq!(lights.owner(PointLightIndex(1)), Some(11));
    }

    #[test]
    fn test_removing_last_moves_nothing() {
        let mut lights = LightManager::new(8);
        lights.create_point_light(1, &light(0.0)).unwrap();
        lights.create_point_light(2, &light(1.0)).unwrap();
        assert_eq!(lights.destroy_point_light(PointLightIndex(1)).unwrap(), None);
        assert!(lights.destroy_point_light(PointLightIndex(1)).is_err());
    }

    #[test]
    fn test_capacity() {
        let mut lights = LightManager::new(1);
        lights.create_point_light(1, &light(0.0)).unwrap();
        assert!(lights.create_point_light(2, &light(1.0)).is_err());
        assert_eq!(LightManager::buffer_size(1), 48 + 32);
    }

    #[test]
    fn test_header_counts_lights() {
        let mut lights = LightManager::new(4);
        lights.create_point_light(1, &light(0.0)).unwrap();
        lights.set_directional_light(DirectionalLight {
            direction: Vec3::new(0.0, -2.0, 0.0),
            color: Vec3::ONE,
            intensity: 3.0,
        });
        let header = lights.header();
        assert_eq!(header.point_light_count, 1);
        assert_eq!(header.directional_direction, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(header.directional_color_intensity[3], 3.0);
    }
}
