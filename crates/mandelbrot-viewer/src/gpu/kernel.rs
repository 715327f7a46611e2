//! Kernel compilation, argument binding and grid covering.
//!
//! Binding convention shared by every kernel run through this module:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> params: ...;   // buffer slot 0
//! @group(1) @binding(0) var out: texture_storage_2d<rgba8unorm, write>; // texture slot 0
//!
//! @compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, WORKGROUP_Z)
//! fn <kernel name>(@builtin(global_invocation_id) gid: vec3<u32>) {
//!     if gid.x >= width || gid.y >= height { return; }
//!     ...
//! }
//! ```
//!
//! `WORKGROUP_X/Y/Z` are prepended to the source at compile time. The grid is covered
//! with `ceil(grid / shape)` groups per axis, so trailing groups have idle lanes past the
//! edge; the kernel must bounds-check its invocation id.

use super::{DispatchMetrics, GpuError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Preferred number of lanes along x when the caller has no better hint.
///
/// 32 matches NVIDIA warps and Apple SIMD groups, and is half an AMD wave64.
pub const DEFAULT_LANE_WIDTH: u32 = 32;

/// Number of invocations requested along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// `(width, height, 1)` of a texture.
    pub fn of_texture(texture: &wgpu::Texture) -> Self {
        Self::new(texture.width(), texture.height(), 1)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}×{}", self.width, self.height, self.depth)
    }
}

/// Lanes in one execution group. Fixed for a kernel's lifetime; every axis is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupShape {
    width: u32,
    height: u32,
    depth: u32,
}

impl GroupShape {
    /// Zero-sized axes are widened to 1.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        const fn at_least_one(n: u32) -> u32 {
            if n == 0 {
                1
            } else {
                n
            }
        }
        Self {
            width: at_least_one(width),
            height: at_least_one(height),
            depth: at_least_one(depth),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `lane_width` lanes across, as many rows as the invocation budget allows.
    pub fn from_limits(limits: &wgpu::Limits, lane_width: u32) -> Self {
        let budget = limits.max_compute_invocations_per_workgroup.max(1);
        let width = lane_width.clamp(1, limits.max_compute_workgroup_size_x.min(budget).max(1));
        let height = (budget / width).clamp(1, limits.max_compute_workgroup_size_y.max(1));
        Self::new(width, height, 1)
    }

    pub fn lanes(&self) -> u32 {
        self.width * self.height * self.depth
    }

    /// Smallest group count whose lanes cover `grid` on every axis.
    pub fn groups_for(&self, grid: GridSize) -> GridSize {
        GridSize::new(
            grid.width.div_ceil(self.width),
            grid.height.div_ceil(self.height),
            grid.depth.div_ceil(self.depth),
        )
    }

    /// WGSL constants naming this shape, prepended to kernel sources.
    fn wgsl_prelude(&self) -> String {
        format!(
            "const WORKGROUP_X: u32 = {}u;\nconst WORKGROUP_Y: u32 = {}u;\nconst WORKGROUP_Z: u32 = {}u;\n",
            self.width, self.height, self.depth
        )
    }
}

impl fmt::Display for GroupShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}×{}×{} ({} lanes)",
            self.width,
            self.height,
            self.depth,
            self.lanes()
        )
    }
}

/// Why a frame's dispatch was not encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither an output texture nor an explicit grid was supplied.
    NoDestination,
    /// The grid has a zero-sized axis.
    EmptyGrid,
    /// The covering group count exceeds the device's per-dimension dispatch limit.
    GridTooLarge,
    /// The surface had no image to render into this tick.
    NoDrawable,
}

impl SkipReason {
    pub const ALL: [SkipReason; 4] = [
        SkipReason::NoDestination,
        SkipReason::EmptyGrid,
        SkipReason::GridTooLarge,
        SkipReason::NoDrawable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoDestination => "no_destination",
            SkipReason::EmptyGrid => "empty_grid",
            SkipReason::GridTooLarge => "grid_too_large",
            SkipReason::NoDrawable => "no_drawable",
        }
    }
}

/// Outcome of one `encode` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Encoded { groups: GridSize },
    Skipped(SkipReason),
}

impl Dispatch {
    pub fn is_encoded(&self) -> bool {
        matches!(self, Dispatch::Encoded { .. })
    }
}

/// Sparse slot table. Positional input maps item `i` to slot `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Slots<T>(BTreeMap<u32, T>);

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Slots<T> {
    fn positional(items: impl IntoIterator<Item = T>) -> Self {
        Self((0u32..).zip(items).collect())
    }

    fn indexed(items: impl IntoIterator<Item = (u32, T)>) -> Self {
        Self(items.into_iter().collect())
    }

    /// Item in the highest slot.
    fn last(&self) -> Option<&T> {
        self.0.values().next_back()
    }
}

/// Buffers and textures for one dispatch, keyed by argument slot.
#[derive(Default)]
pub struct KernelArgs<'a> {
    buffers: Slots<&'a wgpu::Buffer>,
    textures: Slots<&'a wgpu::Texture>,
}

impl<'a> KernelArgs<'a> {
    /// Binds `buffers[i]` and `textures[i]` to slot `i`.
    pub fn from_slices(buffers: &[&'a wgpu::Buffer], textures: &[&'a wgpu::Texture]) -> Self {
        Self {
            buffers: Slots::positional(buffers.iter().copied()),
            textures: Slots::positional(textures.iter().copied()),
        }
    }

    /// Binds each argument to its explicit slot; slots may be sparse.
    pub fn indexed(
        buffers: impl IntoIterator<Item = (u32, &'a wgpu::Buffer)>,
        textures: impl IntoIterator<Item = (u32, &'a wgpu::Texture)>,
    ) -> Self {
        Self {
            buffers: Slots::indexed(buffers),
            textures: Slots::indexed(textures),
        }
    }

    pub fn buffer(mut self, slot: u32, buffer: &'a wgpu::Buffer) -> Self {
        self.buffers.0.insert(slot, buffer);
        self
    }

    pub fn texture(mut self, slot: u32, texture: &'a wgpu::Texture) -> Self {
        self.textures.0.insert(slot, texture);
        self
    }

    /// Grid used when the caller gives none: the last texture's `(width, height, 1)`.
    pub fn default_grid(&self) -> Option<GridSize> {
        self.textures.last().map(|t| GridSize::of_texture(t))
    }
}

/// Picks the group count for a dispatch, or the reason to skip it.
pub(crate) fn plan_dispatch(
    shape: GroupShape,
    max_groups_per_dimension: u32,
    grid: Option<GridSize>,
) -> Result<GridSize, SkipReason> {
    let grid = grid.ok_or(SkipReason::NoDestination)?;
    if grid.is_empty() {
        return Err(SkipReason::EmptyGrid);
    }

    let groups = shape.groups_for(grid);
    if groups.width > max_groups_per_dimension
        || groups.height > max_groups_per_dimension
        || groups.depth > max_groups_per_dimension
    {
        return Err(SkipReason::GridTooLarge);
    }
    Ok(groups)
}

/// A compute operation that can be encoded into a command stream.
pub trait ComputeShader {
    fn name(&self) -> &str;

    /// Encodes one dispatch over `grid`, or over the last texture when `grid` is `None`.
    ///
    /// Nothing is encoded (and nothing fails) when there is no grid to cover.
    fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        args: &KernelArgs<'_>,
        grid: Option<GridSize>,
    ) -> Dispatch;
}

/// Texture-only dispatch sized to the last texture.
pub fn encode_textures<S: ComputeShader + ?Sized>(
    shader: &S,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    textures: &[&wgpu::Texture],
) -> Dispatch {
    shader.encode(device, encoder, &KernelArgs::from_slices(&[], textures), None)
}

/// A single compiled WGSL compute entry point.
pub struct ComputeKernel {
    name: String,
    pipeline: wgpu::ComputePipeline,
    shape: GroupShape,
    max_groups_per_dimension: u32,
    metrics: Arc<DispatchMetrics>,
}

impl ComputeKernel {
    /// Compiles `source` with entry point `name`.
    ///
    /// Fails with `GpuError::KernelUnavailable` if the source does not validate or the
    /// pipeline cannot be created; callers treat that as fatal.
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        lane_width: u32,
        metrics: Arc<DispatchMetrics>,
    ) -> Result<Self, GpuError> {
        let limits = device.limits();
        let shape = GroupShape::from_limits(&limits, lane_width);
        let full_source = format!("{}{}", shape.wgsl_prelude(), source);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(full_source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: None,
            module: &module,
            entry_point: name,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::KernelUnavailable {
                name: name.to_owned(),
                reason: err.to_string(),
            });
        }

        log::info!("Compiled kernel `{name}` with group shape {shape}");

        Ok(Self {
            name: name.to_owned(),
            pipeline,
            shape,
            max_groups_per_dimension: limits.max_compute_workgroups_per_dimension,
            metrics,
        })
    }

    pub fn shape(&self) -> GroupShape {
        self.shape
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }
}

impl ComputeShader for ComputeKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        args: &KernelArgs<'_>,
        grid: Option<GridSize>,
    ) -> Dispatch {
        let groups = match plan_dispatch(
            self.shape,
            self.max_groups_per_dimension,
            grid.or_else(|| args.default_grid()),
        ) {
            Ok(groups) => groups,
            Err(reason) => {
                self.metrics.record_skip(reason);
                return Dispatch::Skipped(reason);
            }
        };

        let views: Vec<(u32, wgpu::TextureView)> = args
            .textures
            .0
            .iter()
            .map(|(slot, tex)| (*slot, tex.create_view(&wgpu::TextureViewDescriptor::default())))
            .collect();

        // Group 0 exists in the derived layout whenever group 1 does, even if empty.
        let buffer_group = (!args.buffers.0.is_empty() || !views.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupEntry> = args
                .buffers
                .0
                .iter()
                .map(|(slot, buf)| wgpu::BindGroupEntry {
                    binding: *slot,
                    resource: buf.as_entire_binding(),
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Kernel Buffers"),
                layout: &self.pipeline.get_bind_group_layout(0),
                entries: &entries,
            })
        });

        let texture_group = (!views.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupEntry> = views
                .iter()
                .map(|(slot, view)| wgpu::BindGroupEntry {
                    binding: *slot,
                    resource: wgpu::BindingResource::TextureView(view),
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Kernel Textures"),
                layout: &self.pipeline.get_bind_group_layout(1),
                entries: &entries,
            })
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            if let Some(group) = &buffer_group {
                pass.set_bind_group(0, group, &[]);
            }
            if let Some(group) = &texture_group {
                pass.set_bind_group(1, group, &[]);
            }
            pass.dispatch_workgroups(groups.width, groups.height, groups.depth);
        }

        self.metrics.record_dispatch();
        log::trace!("Encoded `{}` with {} groups", self.name, groups);
        Dispatch::Encoded { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_cover_non_divisible_grid() {
        let shape = GroupShape::new(32, 32, 1);
        let groups = shape.groups_for(GridSize::new(100, 50, 1));
        assert_eq!(groups, GridSize::new(4, 2, 1));
        // 128×64 lanes cover 100×50.
        assert!(groups.width * shape.width >= 100);
        assert!(groups.height * shape.height >= 50);
    }

    #[test]
    fn zero_axes_are_widened() {
        let shape = GroupShape::new(0, 8, 0);
        assert_eq!(shape, GroupShape::new(1, 8, 1));
        assert_eq!(shape.lanes(), 8);
        assert_eq!(shape.groups_for(GridSize::new(5, 9, 1)), GridSize::new(5, 2, 1));
    }

    #[test]
    fn groups_exact_multiple_has_no_spare_group() {
        let shape = GroupShape::new(16, 8, 1);
        assert_eq!(shape.groups_for(GridSize::new(640, 480, 1)), GridSize::new(40, 60, 1));
        assert_eq!(shape.groups_for(GridSize::new(641, 481, 1)), GridSize::new(41, 61, 1));
    }

    #[test]
    fn covering_never_leaves_lanes_uncovered() {
        let shape = GroupShape::new(32, 8, 1);
        for w in 1..200 {
            for h in [1, 7, 8, 9, 63, 64, 65] {
                let g = shape.groups_for(GridSize::new(w, h, 1));
                assert!(g.width * 32 >= w && (g.width - 1) * 32 < w);
                assert!(g.height * 8 >= h && (g.height - 1) * 8 < h);
            }
        }
    }

    #[test]
    fn shape_from_default_limits() {
        let limits = wgpu::Limits::default();
        let shape = GroupShape::from_limits(&limits, DEFAULT_LANE_WIDTH);
        assert_eq!(shape, GroupShape::new(32, 8, 1));
        assert_eq!(shape.lanes(), limits.max_compute_invocations_per_workgroup);
    }

    #[test]
    fn shape_respects_tight_limits() {
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 64,
            max_compute_workgroup_size_x: 16,
            max_compute_workgroup_size_y: 2,
            ..wgpu::Limits::default()
        };
        // Lane width capped to 16, rows capped to 2.
        assert_eq!(GroupShape::from_limits(&limits, 64), GroupShape::new(16, 2, 1));
        // A zero hint still yields a usable shape.
        assert_eq!(GroupShape::from_limits(&limits, 0).width, 1);
    }

    #[test]
    fn prelude_declares_workgroup_constants() {
        let src = GroupShape::new(32, 8, 1).wgsl_prelude();
        assert!(src.contains("const WORKGROUP_X: u32 = 32u;"));
        assert!(src.contains("const WORKGROUP_Y: u32 = 8u;"));
        assert!(src.contains("const WORKGROUP_Z: u32 = 1u;"));
    }

    #[test]
    fn no_destination_is_a_skip() {
        let shape = GroupShape::new(32, 8, 1);
        assert_eq!(plan_dispatch(shape, 65535, None), Err(SkipReason::NoDestination));
        assert_eq!(KernelArgs::default().default_grid(), None);
        assert_eq!(
            KernelArgs::from_slices(&[], &[]).default_grid(),
            None,
            "empty texture list has no default grid"
        );
    }

    #[test]
    fn plan_rejects_empty_and_oversized_grids() {
        let shape = GroupShape::new(32, 8, 1);
        assert_eq!(
            plan_dispatch(shape, 65535, Some(GridSize::new(0, 10, 1))),
            Err(SkipReason::EmptyGrid)
        );
        assert_eq!(
            plan_dispatch(shape, 4, Some(GridSize::new(129, 8, 1))),
            Err(SkipReason::GridTooLarge)
        );
        assert_eq!(
            plan_dispatch(shape, 4, Some(GridSize::new(128, 8, 1))),
            Ok(GridSize::new(4, 1, 1))
        );
    }

    #[test]
    fn positional_and_indexed_slots_agree() {
        let positional = Slots::positional(["params", "palette"]);
        let indexed = Slots::indexed([(1, "palette"), (0, "params")]);
        assert_eq!(positional, indexed);
        assert_eq!(positional.last(), Some(&"palette"));
    }

    #[test]
    fn indexed_slots_may_be_sparse() {
        let slots = Slots::indexed([(3, 'c'), (0, 'a')]);
        assert_eq!(slots.last(), Some(&'c'));
        assert_eq!(slots.0.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn skip_reason_labels_are_distinct() {
        let mut labels: Vec<_> = SkipReason::ALL.iter().map(|r| r.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), SkipReason::ALL.len());
    }
}
