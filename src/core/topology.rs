use crate::error::ConfigError;
use crate::types::{AreaId, NodeId};

/// Partition of a layer's nodes into square competitive areas.
///
/// Nodes `1..=size` are laid out row-major, `row` nodes per row. Areas are
/// `square x square` blocks, also in row-major order. Blocks are cut at the
/// right edge of a row and at the last node; blocks left without nodes are
/// dropped.
#[derive(Debug, Clone)]
pub struct Topology {
    size: u32,
    row: u32,
    square: u32,
    areas: Vec<Vec<NodeId>>,
    // area_of[id - 1]
    area_of: Vec<AreaId>,
}

impl Topology {
    pub fn build(size: u32, row: u32, square: u32) -> Result<Self, ConfigError> {
        if size == 0 || row == 0 || square == 0 {
            return Err(ConfigError::InvalidGeometry { size, row, square });
        }

        let (size64, row64, square64) = (u64::from(size), u64::from(row), u64::from(square));
        let ycount = size64.div_ceil(row64 * square64);
        let xcount = row64.div_ceil(square64);

        let mut areas: Vec<Vec<NodeId>> = Vec::new();
        let mut area_of = vec![AreaId::MAX; size as usize];

        for y in 0..ycount {
            for x in 0..xcount {
                let mut members = Vec::new();
                for j in 0..square64 {
                    for i in 0..square64 {
                        let column = x * square64 + i;
                        if column >= row64 {
                            break;
                        }
                        let id = (y * square64 + j) * row64 + column + 1;
                        if id > size64 {
                            continue;
                        }
                        members.push(id as NodeId);
                    }
                }
                if members.is_empty() {
                    continue;
                }
                let area = areas.len();
                for &id in &members {
                    area_of[(id - 1) as usize] = area;
                }
                areas.push(members);
            }
        }

        debug_assert!(area_of.iter().all(|&a| a != AreaId::MAX));

        Ok(Self {
            size,
            row,
            square,
            areas,
            area_of,
        })
    }

    #[inline]
    pub fn area_of(&self, id: NodeId) -> Option<AreaId> {
        let index = (id as usize).checked_sub(1)?;
        self.area_of.get(index).copied()
    }

    pub fn area(&self, area: AreaId) -> &[NodeId] {
        self.areas.get(area).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn areas(&self) -> impl Iterator<Item = &[NodeId]> {
        self.areas.iter().map(Vec::as_slice)
    }

    /// Number of areas.
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn node_count(&self) -> u32 {
        self.size
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn square(&self) -> u32 {
        self.square
    }
}
