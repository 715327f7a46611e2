//! Per-frame hand-off from the view map to the escape-time kernel.

use crate::gpu::{
    ComputeKernel, ComputeShader, Dispatch, DispatchMetrics, GpuError, KernelArgs, SkipReason,
};
use bytemuck::{Pod, Zeroable};
use planemap::AffineMap;
use std::sync::Arc;

/// Entry point of the bundled kernel.
pub const KERNEL_NAME: &str = "mandelbrot";

const MANDELBROT_WGSL: &str = include_str!("../shaders/mandelbrot.wgsl");

/// The map as the kernel's `mat3x2<f32>` uniform: columns `(a, b)`, `(c, d)`, `(tx, ty)`.
///
/// Narrowing to `f32` happens here, once per frame; the view state itself stays `f64`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelTransform {
    pub columns: [[f32; 2]; 3],
}

impl KernelTransform {
    pub const SIZE: wgpu::BufferAddress = std::mem::size_of::<Self>() as wgpu::BufferAddress;
}

impl From<AffineMap> for KernelTransform {
    fn from(m: AffineMap) -> Self {
        let [a, b, c, d, tx, ty] = m.to_coefficients().map(|v| v as f32);
        Self {
            columns: [[a, b], [c, d], [tx, ty]],
        }
    }
}

/// Owns the kernel and its parameter buffer; the only writer of that buffer.
pub struct FrameDriver {
    kernel: ComputeKernel,
    params: wgpu::Buffer,
    metrics: Arc<DispatchMetrics>,
}

impl FrameDriver {
    pub fn new(
        device: &wgpu::Device,
        lane_width: u32,
        max_iterations: u32,
        metrics: Arc<DispatchMetrics>,
    ) -> Result<Self, GpuError> {
        let source = kernel_source(max_iterations);
        let kernel = ComputeKernel::new(device, KERNEL_NAME, &source, lane_width, metrics.clone())?;

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Transform"),
            size: KernelTransform::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            kernel,
            params,
            metrics,
        })
    }

    /// Uploads `map` and encodes one kernel pass over `target`.
    ///
    /// The upload is queued before anything recorded in `encoder`, so it is visible to
    /// this frame's dispatch once the encoder is submitted.
    pub fn encode_frame(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        map: AffineMap,
        target: Option<&wgpu::Texture>,
    ) -> Dispatch {
        let Some(target) = target else {
            return self.skip(SkipReason::NoDestination);
        };

        let transform = KernelTransform::from(map);
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&transform));

        let args = KernelArgs::from_slices(&[&self.params], &[target]);
        self.kernel.encode(device, encoder, &args, None)
    }

    /// Records a frame that never reached the kernel.
    pub fn skip(&self, reason: SkipReason) -> Dispatch {
        self.metrics.record_skip(reason);
        Dispatch::Skipped(reason)
    }

    pub fn kernel(&self) -> &ComputeKernel {
        &self.kernel
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }
}

/// The bundled kernel with its iteration budget baked in.
pub fn kernel_source(max_iterations: u32) -> String {
    format!(
        "const MAX_ITERATIONS: u32 = {}u;\n{}",
        max_iterations.max(1),
        MANDELBROT_WGSL
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use planemap::DVec2;

    #[test]
    fn transform_is_24_bytes() {
        assert_eq!(KernelTransform::SIZE, 24);
        assert_eq!(std::mem::align_of::<KernelTransform>(), 4);
    }

    #[test]
    fn transform_packs_columns() {
        let m = AffineMap::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let t = KernelTransform::from(m);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&t));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn viewport_map_survives_narrowing() {
        let m = AffineMap::from_scale(1e-3).translate(DVec2::new(-0.6, 0.25));
        let t = KernelTransform::from(m);
        assert_eq!(t.columns[0], [1e-3, 0.0]);
        assert_eq!(t.columns[2], [-0.6, 0.25]);
    }

    #[test]
    fn source_declares_iteration_budget() {
        let src = kernel_source(500);
        assert!(src.starts_with("const MAX_ITERATIONS: u32 = 500u;"));
        assert!(src.contains("fn mandelbrot("));
        assert!(src.contains("@workgroup_size(WORKGROUP_X, WORKGROUP_Y, WORKGROUP_Z)"));
        assert!(kernel_source(0).starts_with("const MAX_ITERATIONS: u32 = 1u;"));
    }
}
