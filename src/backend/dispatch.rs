//! Lane-id layout of merged groups and runtime group resolution.
//!
//! Every merged group in a kernel owns a contiguous range of lane ids,
//! made of one block-padded sub-range per member. Generated code tests
//! each group's range in turn; within a multi-member group the member is
//! found by binary search over its start-id table.

use tracing::debug;

use crate::codegen::environment::{Environment, Scope};
use crate::error::Result;
use crate::merged::{GroupMerged, MergeableGroup};
use crate::types::ResolvedType;

/// Round `size` up to a multiple of `block_size`.
pub fn pad_size(size: u32, block_size: u32) -> u32 {
    size.div_ceil(block_size) * block_size
}

/// Lane ids owned by one merged group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRange {
    /// First lane id of the group.
    pub id_start: u32,
    /// First lane id of each member, ascending.
    pub start_ids: Vec<u32>,
    /// Sum of the members' padded sizes.
    pub padded_size: u32,
}

impl DispatchRange {
    pub fn new(id_start: u32, sizes: &[u32], block_size: u32) -> Self {
        let mut start_ids = Vec::with_capacity(sizes.len());
        let mut next = id_start;
        for &size in sizes {
            start_ids.push(next);
            next += pad_size(size, block_size);
        }
        Self {
            id_start,
            start_ids,
            padded_size: next - id_start,
        }
    }

    pub fn end(&self) -> u32 {
        self.id_start + self.padded_size
    }

    pub fn contains(&self, id: u32) -> bool {
        id >= self.id_start && id < self.end()
    }

    /// Member and local id of lane `id`, by the same binary search the
    /// generated code performs.
    pub fn resolve(&self, id: u32) -> Option<(usize, u32)> {
        if !self.contains(id) {
            return None;
        }
        if self.start_ids.len() == 1 {
            return Some((0, id - self.id_start));
        }
        let mut lo = 0;
        let mut hi = self.start_ids.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if id < self.start_ids[mid] {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Some((lo - 1, id - self.start_ids[lo - 1]))
    }
}

/// Lay out consecutive merged groups, each given by its members' sizes.
pub fn layout(groups: &[Vec<u32>], block_size: u32) -> Vec<DispatchRange> {
    let mut id_start = 0;
    groups
        .iter()
        .map(|sizes| {
            let range = DispatchRange::new(id_start, sizes, block_size);
            id_start = range.end();
            range
        })
        .collect()
}

/// (group, member, local id) of lane `id`: guards in order, then search.
pub fn resolve_lane(ranges: &[DispatchRange], id: u32) -> Option<(usize, usize, u32)> {
    ranges.iter().enumerate().find_map(|(group, range)| {
        range
            .resolve(id)
            .map(|(member, local)| (group, member, local))
    })
}

/// Reference resolution: walk every member's padded range in order.
pub fn resolve_lane_linear(groups: &[Vec<u32>], block_size: u32, id: u32) -> Option<(usize, usize, u32)> {
    let mut start = 0;
    for (group, sizes) in groups.iter().enumerate() {
        for (member, &size) in sizes.iter().enumerate() {
            let padded = pad_size(size, block_size);
            if id < start + padded {
                return Some((group, member, id - start));
            }
            start += padded;
        }
    }
    None
}

/// Emit dispatch for every merged group of a kernel.
///
/// For each group this writes the range guard and, for multi-member groups,
/// the start-id binary search into `env`, then calls `body` with a child
/// scope where `id` is the member-local lane id. `id_start` advances past
/// each group. Returns the ranges so callers can emit start-id tables.
pub fn gen_group<'m, G, F>(
    env: &mut dyn Scope,
    groups: &mut [GroupMerged<'m, G>],
    id_start: &mut u32,
    block_size: u32,
    member_lanes: impl Fn(&G) -> u32,
    mut body: F,
) -> Result<Vec<DispatchRange>>
where
    G: MergeableGroup,
    F: FnMut(&mut Environment<'_>, &mut GroupMerged<'m, G>) -> Result<()>,
{
    let id = env.get_name("id", None)?;
    let mut ranges = Vec::with_capacity(groups.len());
    for merged in groups.iter_mut() {
        let sizes: Vec<u32> = merged.groups().iter().map(|g| member_lanes(g)).collect();
        let range = DispatchRange::new(*id_start, &sizes, block_size);
        debug!(
            group = %merged.struct_name(),
            id_start = range.id_start,
            padded_size = range.padded_size,
            "dispatch range"
        );

        env.stream().line(&format!("// merged{}", merged.index()));
        if range.id_start == 0 {
            env.stream().line(&format!("if({} < {})", id, range.padded_size));
        } else {
            env.stream()
                .line(&format!("if({} >= {} && {} < {})", id, range.id_start, id, range.end()));
        }
        env.stream().line("{");
        let multi = sizes.len() > 1;
        if multi {
            gen_binary_search(env.stream(), &id, &merged.start_id_table(), sizes.len());
            env.stream().line(&format!(
                "struct {} *group = &{}[lo - 1];",
                merged.struct_name(),
                merged.device_array()
            ));
        } else {
            env.stream().line(&format!(
                "struct {} *group = &{}[0];",
                merged.struct_name(),
                merged.device_array()
            ));
        }
        {
            let mut group_env = Environment::new(&mut *env);
            let const_uint = ResolvedType::UINT32.add_const();
            if multi {
                let init = group_env.add_initialiser(&format!(
                    "const unsigned int groupStartID = {}[lo - 1];",
                    merged.start_id_table()
                ));
                group_env.add_with_initialisers("_group_start_id", const_uint.clone(), "groupStartID", &[init])?;
            } else {
                group_env.add("_group_start_id", const_uint.clone(), &range.id_start.to_string())?;
            }
            let init = group_env.add_initialiser(&format!(
                "const unsigned int lid = {} - $(_group_start_id);",
                id
            ));
            group_env.add_with_initialisers("id", const_uint, "lid", &[init])?;
            body(&mut group_env, merged)?;
        }
        env.stream().line("}");

        *id_start = range.end();
        ranges.push(range);
    }
    Ok(ranges)
}

fn gen_binary_search(os: &mut crate::codegen::code_stream::CodeStream, id: &str, table: &str, members: usize) {
    os.line("unsigned int lo = 0;");
    os.line(&format!("unsigned int hi = {};", members));
    os.line("while(lo < hi)");
    os.line("{");
    os.line("const unsigned int mid = (lo + hi) / 2;");
    os.line(&format!("if({} < {}[mid])", id, table));
    os.line("{");
    os.line("hi = mid;");
    os.line("}");
    os.line("else");
    os.line("{");
    os.line("lo = mid + 1;");
    os.line("}");
    os.line("}");
}
