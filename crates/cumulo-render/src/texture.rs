//! GPU 3D texture ownership for volume data.
//!
//! [`VolumeTexture`] validates its extent against the device limits, uploads
//! the whole volume in a single call, owns the filtering sampler, and tracks
//! explicit destruction. Use after [`VolumeTexture::destroy`] is a
//! programming error and is asserted, not surfaced as a `Result`.

use glam::UVec3;

use crate::context::{Context, VolumeCaps};
use crate::error::{RenderError, RenderResult};

/// Default depth used by [`VolumeTexture::from_framebuffer`].
const FRAMEBUFFER_DEFAULT_DEPTH: u32 = 128;

/// The datatype of the source samples, derived from the upload slice's
/// element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDatatype {
    /// 8-bit normalized samples (`&[u8]` sources).
    UnsignedByte,
    /// 32-bit float samples (`&[f32]` sources).
    Float32,
}

/// Source element types accepted for volume uploads.
pub trait Texel: bytemuck::Pod {
    /// The datatype this element type maps to.
    const DATATYPE: PixelDatatype;
}

impl Texel for u8 {
    const DATATYPE: PixelDatatype = PixelDatatype::UnsignedByte;
}

impl Texel for f32 {
    const DATATYPE: PixelDatatype = PixelDatatype::Float32;
}

/// Min/mag filtering for the volume sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerOptions {
    /// Minification filter.
    pub min_filter: wgpu::FilterMode,
    /// Magnification filter.
    pub mag_filter: wgpu::FilterMode,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            min_filter: wgpu::FilterMode::Linear,
            mag_filter: wgpu::FilterMode::Linear,
        }
    }
}

/// Declared shape of a volume texture.
#[derive(Debug, Clone, Copy)]
pub struct VolumeTextureDescriptor {
    /// Texture width in texels.
    pub width: u32,
    /// Texture height in texels.
    pub height: u32,
    /// Texture depth in texels.
    pub depth: u32,
    /// Pixel format.
    pub format: wgpu::TextureFormat,
    /// Whether the source rows are stored bottom-up. Volume sources are
    /// generated top-down, so this is normally false.
    pub flip_y: bool,
}

/// Bytes per texel for the supported volume formats.
///
/// # Errors
/// Returns [`RenderError::InvalidPixelFormat`] for formats outside the set.
pub fn bytes_per_texel(format: wgpu::TextureFormat) -> RenderResult<u32> {
    match format {
        wgpu::TextureFormat::R8Unorm => Ok(1),
        wgpu::TextureFormat::Rg8Unorm => Ok(2),
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::R32Float => Ok(4),
        other => Err(RenderError::InvalidPixelFormat(other)),
    }
}

/// Validates one extent value against the device maximum.
///
/// Pure so it can be exercised against stubbed limits; the signed parameter
/// lets callers that compute sizes reject negatives before the cast.
///
/// # Errors
/// Returns [`RenderError::InvalidDimension`] when `value` is not in
/// `1..=max`.
pub fn validate_dimension(dimension: &'static str, value: i64, max: u32) -> RenderResult<u32> {
    if value < 1 || value > i64::from(max) {
        return Err(RenderError::InvalidDimension {
            dimension,
            value,
            max,
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u32)
}

/// Validates a full descriptor + datatype pair against a capability snapshot.
///
/// # Errors
/// Returns the first construction fault found; no GPU state is touched.
pub fn validate_descriptor(
    desc: &VolumeTextureDescriptor,
    datatype: PixelDatatype,
    caps: &VolumeCaps,
) -> RenderResult<()> {
    let max = caps.max_texture_dimension_3d;
    validate_dimension("width", i64::from(desc.width), max)?;
    validate_dimension("height", i64::from(desc.height), max)?;
    validate_dimension("depth", i64::from(desc.depth), max)?;
    if !caps.supports_format(desc.format) {
        return Err(RenderError::InvalidPixelFormat(desc.format));
    }
    if !caps.supports_datatype(datatype) {
        return Err(RenderError::InvalidPixelDatatype(datatype));
    }
    Ok(())
}

/// A GPU-resident 3D texture with its filtering sampler.
pub struct VolumeTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    sampler_options: SamplerOptions,
    sampler_generation: u64,
    width: u32,
    height: u32,
    depth: u32,
    format: wgpu::TextureFormat,
    datatype: PixelDatatype,
    destroyed: bool,
}

impl VolumeTexture {
    /// Creates a volume texture and uploads `source` as the full 3D image in
    /// one call (no mip levels).
    ///
    /// The pixel datatype is derived from the source element type. The
    /// sampler defaults to linear filtering when none is given.
    ///
    /// # Errors
    /// Construction faults per the validation rules: out-of-range dimensions,
    /// unsupported format/datatype, or a source buffer that does not match
    /// `width * height * depth * bytes_per_texel`. Nothing is allocated on
    /// failure.
    pub fn new<T: Texel>(
        context: &Context,
        desc: &VolumeTextureDescriptor,
        source: &[T],
        sampler: Option<SamplerOptions>,
    ) -> RenderResult<Self> {
        validate_descriptor(desc, T::DATATYPE, &context.volume_caps())?;

        let bpp = bytes_per_texel(desc.format)?;
        let bytes: &[u8] = bytemuck::cast_slice(source);
        let expected =
            desc.width as usize * desc.height as usize * desc.depth as usize * bpp as usize;
        if bytes.len() != expected {
            return Err(RenderError::SourceSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let extent = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.depth,
        };

        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: desc.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let row_bytes = desc.width * bpp;
        let mut image = std::borrow::Cow::Borrowed(bytes);
        if desc.flip_y {
            let mut flipped = Vec::with_capacity(bytes.len());
            for slice in bytes.chunks_exact(row_bytes as usize * desc.height as usize) {
                for row in slice.chunks_exact(row_bytes as usize).rev() {
                    flipped.extend_from_slice(row);
                }
            }
            image = std::borrow::Cow::Owned(flipped);
        }

        context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(row_bytes),
                rows_per_image: Some(desc.height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("volume texture view"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        let sampler_options = sampler.unwrap_or_default();
        let sampler = Self::create_sampler(context, sampler_options);

        Ok(Self {
            texture,
            view,
            sampler,
            sampler_options,
            sampler_generation: 0,
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            format: desc.format,
            datatype: T::DATATYPE,
            destroyed: false,
        })
    }

    /// Creates a volume texture populated from a framebuffer region.
    ///
    /// Width/height default to the framebuffer texture size and depth
    /// defaults to 128; the framebuffer content fills the first depth slice.
    ///
    /// # Errors
    /// Same validation rules as [`VolumeTexture::new`].
    pub fn from_framebuffer(
        context: &Context,
        framebuffer: &wgpu::Texture,
        format: Option<wgpu::TextureFormat>,
        width: Option<u32>,
        height: Option<u32>,
        depth: Option<u32>,
    ) -> RenderResult<Self> {
        let desc = VolumeTextureDescriptor {
            width: width.unwrap_or_else(|| framebuffer.width()),
            height: height.unwrap_or_else(|| framebuffer.height()),
            depth: depth.unwrap_or(FRAMEBUFFER_DEFAULT_DEPTH),
            format: format.unwrap_or(wgpu::TextureFormat::Rgba8Unorm),
            flip_y: false,
        };
        validate_descriptor(&desc, PixelDatatype::UnsignedByte, &context.volume_caps())?;
        bytes_per_texel(desc.format)?;

        let extent = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.depth,
        };

        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volume texture (framebuffer)"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: desc.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("framebuffer to volume copy"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: framebuffer,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: desc.width.min(framebuffer.width()),
                height: desc.height.min(framebuffer.height()),
                depth_or_array_layers: 1,
            },
        );
        context.queue.submit(std::iter::once(encoder.finish()));

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("volume texture view"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        let sampler_options = SamplerOptions::default();
        let sampler = Self::create_sampler(context, sampler_options);

        Ok(Self {
            texture,
            view,
            sampler,
            sampler_options,
            sampler_generation: 0,
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            format: desc.format,
            datatype: PixelDatatype::UnsignedByte,
            destroyed: false,
        })
    }

    fn create_sampler(context: &Context, options: SamplerOptions) -> wgpu::Sampler {
        context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: options.mag_filter,
            min_filter: options.min_filter,
            ..Default::default()
        })
    }

    fn assert_live(&self) {
        assert!(!self.destroyed, "volume texture used after destroy()");
    }

    /// The texture view bound by draw commands.
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        self.assert_live();
        &self.view
    }

    /// The current sampler object.
    #[must_use]
    pub fn sampler(&self) -> &wgpu::Sampler {
        self.assert_live();
        &self.sampler
    }

    /// The current sampler filtering options.
    #[must_use]
    pub fn sampler_options(&self) -> SamplerOptions {
        self.sampler_options
    }

    /// Replaces the sampler.
    ///
    /// This is a device-side mutation, not a pure property write: the new
    /// sampler object only takes effect for bind groups built afterwards, so
    /// commands holding the old one must be refreshed. The generation counter
    /// lets owners detect that.
    pub fn set_sampler(&mut self, context: &Context, options: SamplerOptions) {
        self.assert_live();
        self.sampler = Self::create_sampler(context, options);
        self.sampler_options = options;
        self.sampler_generation += 1;
    }

    /// Monotonic counter bumped by every [`VolumeTexture::set_sampler`].
    #[must_use]
    pub fn sampler_generation(&self) -> u64 {
        self.sampler_generation
    }

    /// Texture width in texels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Texture height in texels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texture depth in texels.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The full extent as a vector.
    #[must_use]
    pub fn dimensions(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// The pixel format.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// The source datatype the texture was created from.
    #[must_use]
    pub fn datatype(&self) -> PixelDatatype {
        self.datatype
    }

    /// Releases the GPU texture memory and flags the object destroyed.
    ///
    /// Idempotent; every other method asserts against use after this.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.texture.destroy();
            self.destroyed = true;
        }
    }

    /// Returns whether [`VolumeTexture::destroy`] has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VolumeCaps;

    fn stub_caps() -> VolumeCaps {
        VolumeCaps {
            max_texture_dimension_3d: 2048,
            formats: vec![wgpu::TextureFormat::R8Unorm, wgpu::TextureFormat::Rgba8Unorm],
            datatypes: vec![PixelDatatype::UnsignedByte],
        }
    }

    fn desc(width: u32, height: u32, depth: u32) -> VolumeTextureDescriptor {
        VolumeTextureDescriptor {
            width,
            height,
            depth,
            format: wgpu::TextureFormat::R8Unorm,
            flip_y: false,
        }
    }

    #[test]
    fn test_validate_dimension_bounds() {
        assert!(validate_dimension("width", 0, 2048).is_err());
        assert!(validate_dimension("width", -1, 2048).is_err());
        assert!(validate_dimension("width", 2049, 2048).is_err());
        assert_eq!(validate_dimension("width", 1, 2048).unwrap(), 1);
        assert_eq!(validate_dimension("width", 2048, 2048).unwrap(), 2048);
    }

    #[test]
    fn test_validate_descriptor_accepts_valid() {
        assert!(validate_descriptor(&desc(128, 128, 128), PixelDatatype::UnsignedByte, &stub_caps()).is_ok());
    }

    #[test]
    fn test_validate_descriptor_rejects_zero_extent() {
        let caps = stub_caps();
        for bad in [desc(0, 128, 128), desc(128, 0, 128), desc(128, 128, 0)] {
            let err = validate_descriptor(&bad, PixelDatatype::UnsignedByte, &caps).unwrap_err();
            assert!(matches!(err, RenderError::InvalidDimension { .. }), "{err}");
        }
    }

    #[test]
    fn test_validate_descriptor_rejects_over_max() {
        let caps = VolumeCaps {
            max_texture_dimension_3d: 64,
            ..stub_caps()
        };
        let err =
            validate_descriptor(&desc(65, 64, 64), PixelDatatype::UnsignedByte, &caps).unwrap_err();
        match err {
            RenderError::InvalidDimension {
                dimension, value, max,
            } => {
                assert_eq!(dimension, "width");
                assert_eq!(value, 65);
                assert_eq!(max, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_descriptor_rejects_unsupported_format() {
        let mut bad = desc(16, 16, 16);
        bad.format = wgpu::TextureFormat::Rgba32Float;
        let err = validate_descriptor(&bad, PixelDatatype::UnsignedByte, &stub_caps()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidPixelFormat(_)));
    }

    #[test]
    fn test_validate_descriptor_rejects_unsupported_datatype() {
        let err = validate_descriptor(&desc(16, 16, 16), PixelDatatype::Float32, &stub_caps())
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidPixelDatatype(PixelDatatype::Float32)
        ));
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::R8Unorm).unwrap(), 1);
        assert_eq!(bytes_per_texel(wgpu::TextureFormat::Rgba8Unorm).unwrap(), 4);
        assert!(bytes_per_texel(wgpu::TextureFormat::Depth32Float).is_err());
    }

    #[test]
    fn test_texel_datatype_derivation() {
        assert_eq!(<u8 as Texel>::DATATYPE, PixelDatatype::UnsignedByte);
        assert_eq!(<f32 as Texel>::DATATYPE, PixelDatatype::Float32);
    }

    proptest::proptest! {
        #[test]
        fn prop_validate_dimension_matches_range(value in -10i64..5000, max in 1u32..4096) {
            let result = validate_dimension("depth", value, max);
            let in_range = value >= 1 && value <= i64::from(max);
            proptest::prop_assert_eq!(result.is_ok(), in_range);
        }
    }
}
