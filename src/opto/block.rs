//! Basic blocks of the scheduled graph.
//!
//! After global code motion every node lives in exactly one [`Block`]. Blocks keep their
//! nodes in a `Node_List` and their successors in a `Block_Array`, both embedded in the
//! block object; the blocks of a compilation are kept in a `Block_List` owned by
//! [`crate::opto::PhaseCfg`].

use std::io;

use crate::{
    opto::{NodeList, NodeRc},
    session::Session,
    target::{read_pointer_array, Address},
    Result,
};

field_table! {
    /// Members of `Block_Array`
    pub(crate) struct BlockArrayFields = "Block_Array" {
        size: CInt("_size"),
        blocks: Address("_blocks"),
    }
}

field_table! {
    /// Members of `Block_List`
    pub(crate) struct BlockListFields = "Block_List" {
        cnt: CInt("_cnt"),
    }
}

field_table! {
    /// Members of `Block`
    pub(crate) struct BlockFields = "Block" {
        nodes: Embedded("_nodes"),
        succs: Embedded("_succs"),
        num_succs: CInt("_num_succs"),
        pre_order: CInt("_pre_order"),
        dom_depth: CInt("_dom_depth"),
        idom: Address("_idom"),
        freq: Double("_freq"),
    }
}

/// A view of a `Block_Array`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockArray {
    address: Address,
}

impl BlockArray {
    /// Wraps the array at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| BlockArray { address })
    }

    /// Address of the array object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Capacity of the array.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn size(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let size = state
            .block_array_fields()?
            .size
            .read_int::<u32>(state.memory(), self.address)?;
        Ok(size as usize)
    }

    /// The first `count` blocks; empty slots are skipped.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`crate::Error::Malformed`] if `count` exceeds the
    /// capacity.
    pub fn blocks(&self, session: &Session, count: usize) -> Result<Vec<Block>> {
        let size = self.size(session)?;
        if count > size {
            return Err(malformed_error!(
                "Block_Array at {} has {} slots, {} requested",
                self.address,
                size,
                count
            ));
        }

        let state = session.state()?;
        let data = state
            .block_array_fields()?
            .blocks
            .read_address(state.memory(), self.address)?;
        Ok(read_pointer_array(state.memory(), data, count)?
            .into_iter()
            .filter_map(Block::new)
            .collect())
    }
}

/// A view of a `Block_List`: a [`BlockArray`] with a fill count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockList {
    array: BlockArray,
}

impl BlockList {
    /// Wraps the list at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        BlockArray::new(address).map(|array| BlockList { array })
    }

    /// Address of the list object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.array.address()
    }

    /// Number of blocks in the list.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn size(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let cnt = state
            .block_list_fields()?
            .cnt
            .read_int::<u32>(state.memory(), self.address())?;
        Ok(cnt as usize)
    }

    /// The blocks in list order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn blocks(&self, session: &Session) -> Result<Vec<Block>> {
        self.array.blocks(session, self.size(session)?)
    }
}

/// A view of one basic `Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    address: Address,
}

impl Block {
    /// Wraps the block at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| Block { address })
    }

    /// Address of the block object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The nodes scheduled in this block, in order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn nodes(&self, session: &Session) -> Result<Vec<NodeRc>> {
        let state = session.state()?;
        let list = state.block_fields()?.nodes.address_in(self.address);
        match NodeList::new(list) {
            Some(list) => list.nodes(session),
            None => Ok(Vec::new()),
        }
    }

    /// Number of successor blocks.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn num_succs(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let count = state
            .block_fields()?
            .num_succs
            .read_int::<u32>(state.memory(), self.address)?;
        Ok(count as usize)
    }

    /// Successor blocks, in branch order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn succs(&self, session: &Session) -> Result<Vec<Block>> {
        let state = session.state()?;
        let array = state.block_fields()?.succs.address_in(self.address);
        let count = self.num_succs(session)?;
        match BlockArray::new(array) {
            Some(array) => array.blocks(session, count),
            None => Ok(Vec::new()),
        }
    }

    /// Reverse post order number.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn pre_order(&self, session: &Session) -> Result<u32> {
        let state = session.state()?;
        state
            .block_fields()?
            .pre_order
            .read_int::<u32>(state.memory(), self.address)
    }

    /// Depth in the dominator tree.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn dom_depth(&self, session: &Session) -> Result<u32> {
        let state = session.state()?;
        state
            .block_fields()?
            .dom_depth
            .read_int::<u32>(state.memory(), self.address)
    }

    /// Immediate dominator; `None` for the entry block.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn idom(&self, session: &Session) -> Result<Option<Block>> {
        let state = session.state()?;
        let idom = state
            .block_fields()?
            .idom
            .read_address(state.memory(), self.address)?;
        Ok(Block::new(idom))
    }

    /// Estimated execution frequency.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn freq(&self, session: &Session) -> Result<f64> {
        let state = session.state()?;
        state
            .block_fields()?
            .freq
            .read_f64(state.memory(), self.address)
    }

    /// Writes the block header, its dominator and successors, then one line per node.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and [`crate::Error::Io`] if writing fails.
    pub fn dump(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        writeln!(
            out,
            "B{}: #\tfreq: {}",
            self.pre_order(session)?,
            self.freq(session)?
        )?;

        match self.idom(session)? {
            Some(idom) => writeln!(
                out,
                "\tIDom: B{}/#{}",
                idom.pre_order(session)?,
                self.dom_depth(session)?
            )?,
            None => writeln!(out, "\tIDom: none")?,
        }

        let succs = self.succs(session)?;
        if succs.is_empty() {
            writeln!(out, "\tSuccs: none")?;
        } else {
            write!(out, "\tSuccs:")?;
            for succ in &succs {
                write!(out, " B{}", succ.pre_order(session)?)?;
            }
            writeln!(out)?;
        }

        for node in self.nodes(session)? {
            node.dump_line(session, out)?;
        }
        writeln!(out)?;
        Ok(())
    }
}
