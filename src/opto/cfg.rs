use std::io;

use crate::{
    opto::{Block, BlockList},
    session::Session,
    target::Address,
    Result,
};

field_table! {
    /// Members of `PhaseCFG`
    pub(crate) struct PhaseCfgFields = "PhaseCFG" {
        number_of_blocks: CInt("_number_of_blocks"),
        blocks: Embedded("_blocks"),
        root_block: Address("_root_block"),
    }
}

/// A view of the `PhaseCFG` of a compilation: its basic blocks after scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseCfg {
    address: Address,
}

impl PhaseCfg {
    /// Wraps the phase at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| PhaseCfg { address })
    }

    /// Address of the phase object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of basic blocks.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn number_of_blocks(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let count = state
            .phase_cfg_fields()?
            .number_of_blocks
            .read_int::<u32>(state.memory(), self.address)?;
        Ok(count as usize)
    }

    /// The blocks in reverse post order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn blocks(&self, session: &Session) -> Result<Vec<Block>> {
        let state = session.state()?;
        let list = state.phase_cfg_fields()?.blocks.address_in(self.address);
        let Some(list) = BlockList::new(list) else {
            return Ok(Vec::new());
        };

        let count = self.number_of_blocks(session)?;
        let mut blocks = list.blocks(session)?;
        blocks.truncate(count);
        Ok(blocks)
    }

    /// The block holding the root node.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn root_block(&self, session: &Session) -> Result<Option<Block>> {
        let state = session.state()?;
        let root = state
            .phase_cfg_fields()?
            .root_block
            .read_address(state.memory(), self.address)?;
        Ok(Block::new(root))
    }

    /// Writes a header line followed by the dump of every block.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and [`crate::Error::Io`] if writing fails.
    pub fn dump(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        writeln!(out, "--- CFG --- {} BBs", self.number_of_blocks(session)?)?;
        for block in self.blocks(session)? {
            block.dump(session, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::scheduled_compile;

    #[test]
    fn blocks_in_order() {
        let (fixture, compile) = scheduled_compile();
        let session = fixture.session();
        let cfg = crate::opto::Compile::new(compile)
            .unwrap()
            .cfg(&session)
            .unwrap()
            .unwrap();

        assert_eq!(cfg.number_of_blocks(&session).unwrap(), 2);
        let blocks = cfg.blocks(&session).unwrap();
        let pre: Vec<u32> = blocks
            .iter()
            .map(|block| block.pre_order(&session).unwrap())
            .collect();
        assert_eq!(pre, vec![0, 1]);
        assert_eq!(cfg.root_block(&session).unwrap(), Some(blocks[1]));
    }

    #[test]
    fn dump_header() {
        let (fixture, compile) = scheduled_compile();
        let session = fixture.session();
        let cfg = crate::opto::Compile::new(compile)
            .unwrap()
            .cfg(&session)
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        cfg.dump(&session, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("--- CFG --- 2 BBs\nB0: #\tfreq: 1\n"));
        assert_eq!(text.matches("\tSuccs:").count(), 2);
    }
}
