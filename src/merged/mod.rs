//! Merging of structurally identical groups.
//!
//! Groups whose structural digests match share one kernel body and one
//! struct type; each member gets its own struct instance holding the
//! fields the generated code referenced.

pub mod custom_connectivity;
pub mod fields;

use indexmap::IndexMap;
use tracing::debug;

use crate::codegen::code_stream::CodeStream;
use crate::hash::{ContentHash, StructuralHasher};
use crate::model::{CustomConnectivityUpdate, CustomUpdate};

use fields::StructFields;

/// Something that can be merged with its structural twins.
pub trait MergeableGroup {
    fn name(&self) -> &str;
}

impl MergeableGroup for CustomUpdate {
    fn name(&self) -> &str {
        &self.name
    }
}

impl MergeableGroup for CustomConnectivityUpdate {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One merged struct type and the groups instantiating it.
#[derive(Debug)]
pub struct GroupMerged<'m, G> {
    kind: &'static str,
    index: usize,
    groups: Vec<&'m G>,
    hash: ContentHash,
    /// Struct array lives in host memory.
    host: bool,
    pub fields: StructFields,
}

impl<'m, G: MergeableGroup> GroupMerged<'m, G> {
    pub fn new(kind: &'static str, index: usize, groups: Vec<&'m G>, hash: ContentHash) -> Self {
        Self {
            kind,
            index,
            groups,
            hash,
            host: false,
            fields: StructFields::new(),
        }
    }

    /// Keep the struct array in host memory.
    pub fn on_host(mut self) -> Self {
        self.host = true;
        self
    }

    pub fn is_host(&self) -> bool {
        self.host
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn groups(&self) -> &[&'m G] {
        &self.groups
    }

    /// Representative member driving shared codegen decisions.
    pub fn archetype(&self) -> &'m G {
        self.groups[0]
    }

    /// e.g. `MergedCustomUpdateGroup3`.
    pub fn struct_name(&self) -> String {
        format!("Merged{}Group{}", self.kind, self.index)
    }

    /// Device array holding one struct per member.
    pub fn device_array(&self) -> String {
        format!("d_merged{}Group{}", self.kind, self.index)
    }

    /// Host array holding one struct per member.
    pub fn host_array(&self) -> String {
        format!("merged{}Group{}", self.kind, self.index)
    }

    /// Function copying one member's struct into its slot.
    pub fn push_function(&self) -> String {
        if self.host {
            format!("pushMerged{}Group{}", self.kind, self.index)
        } else {
            format!("pushMerged{}Group{}ToDevice", self.kind, self.index)
        }
    }

    /// Device table of member start ids.
    pub fn start_id_table(&self) -> String {
        format!("d_merged{}GroupStartID{}", self.kind, self.index)
    }

    /// Host code pushing every member's struct into place.
    pub fn gen_push_calls(&self, os: &mut CodeStream) {
        let function = self.push_function();
        for (i, group) in self.groups.iter().enumerate() {
            let mut args = vec![i.to_string()];
            args.extend(self.fields.values(i));
            os.line(&format!("// {}", group.name()));
            os.line(&format!("{}({});", function, args.join(", ")));
        }
    }

    /// Size of the whole device array in bytes.
    pub fn array_bytes(&self) -> usize {
        self.fields.struct_size() * self.groups.len()
    }
}

/// Bucket `groups` by the digest `hash` computes, preserving first-seen
/// order of both buckets and members. Indices start at `first_index`.
pub fn merge_groups<'m, G, I, H>(
    kind: &'static str,
    first_index: usize,
    groups: I,
    hash: H,
) -> Vec<GroupMerged<'m, G>>
where
    G: MergeableGroup + 'm,
    I: IntoIterator<Item = &'m G>,
    H: Fn(&G, &mut StructuralHasher),
{
    let mut buckets: IndexMap<ContentHash, Vec<&'m G>> = IndexMap::new();
    for group in groups {
        let mut hasher = StructuralHasher::new();
        hash(group, &mut hasher);
        let digest = hasher.finish();
        debug!(kind, group = group.name(), hash = %digest, "hashed group");
        buckets.entry(digest).or_default().push(group);
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(i, (digest, members))| {
            debug!(
                kind,
                index = first_index + i,
                members = members.len(),
                archetype = members[0].name(),
                "merged groups"
            );
            GroupMerged::new(kind, first_index + i, members, digest)
        })
        .collect()
}
