use crate::{
    opto::NodeRc,
    session::Session,
    target::{read_pointer_array, Address},
    Result,
};

field_table! {
    /// Members of `Node_Array`
    pub(crate) struct NodeArrayFields = "Node_Array" {
        max: CInt("_max"),
        nodes: Address("_nodes"),
    }
}

field_table! {
    /// Members of `Node_List`
    pub(crate) struct NodeListFields = "Node_List" {
        cnt: CInt("_cnt"),
    }
}

/// A view of a `Node_Array`: a fixed capacity array of node pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeArray {
    address: Address,
}

impl NodeArray {
    /// Wraps the array at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| NodeArray { address })
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
    pub fn max(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let max = state
            .node_array_fields()?
            .max
            .read_int::<u32>(state.memory(), self.address)?;
        Ok(max as usize)
    }

    /// Slot `index`; `None` past the capacity or for an empty slot.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn at(&self, session: &Session, index: usize) -> Result<Option<NodeRc>> {
        if index >= self.max(session)? {
            return Ok(None);
        }
        let state = session.state()?;
        let nodes = state
            .node_array_fields()?
            .nodes
            .read_address(state.memory(), self.address)?;
        let slot = nodes.plus_offset((index * state.target().address_size()) as u64);
        session.node_at(state.memory().read_pointer(slot)?)
    }

    pub(crate) fn slots(&self, session: &Session, count: usize) -> Result<Vec<Address>> {
        let state = session.state()?;
        let nodes = state
            .node_array_fields()?
            .nodes
            .read_address(state.memory(), self.address)?;
        read_pointer_array(state.memory(), nodes, count)
    }
}

/// A view of a `Node_List`: a [`NodeArray`] with a fill count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeList {
    array: NodeArray,
}

impl NodeList {
    /// Wraps the list at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        NodeArray::new(address).map(|array| NodeList { array })
    }

    /// Address of the list object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.array.address()
    }

    /// The underlying array.
    #[must_use]
    pub fn as_array(&self) -> NodeArray {
        self.array
    }

    /// Number of nodes in the list.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn size(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let cnt = state
            .node_list_fields()?
            .cnt
            .read_int::<u32>(state.memory(), self.address())?;
        Ok(cnt as usize)
    }

    /// The nodes in list order; empty slots are skipped.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`crate::Error::Malformed`] if the count exceeds the
    /// capacity.
    pub fn nodes(&self, session: &Session) -> Result<Vec<NodeRc>> {
        let size = self.size(session)?;
        let max = self.array.max(session)?;
        if size > max {
            return Err(malformed_error!(
                "Node_List at {} holds {} nodes but only {} slots",
                self.address(),
                size,
                max
            ));
        }

        let mut nodes = Vec::with_capacity(size);
        for address in self.array.slots(session, size)? {
            if let Some(node) = session.node_at(address)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Fixture;

    #[test]
    fn list_and_array_access() {
        let mut fixture = Fixture::new();
        let a = fixture.node("AddINode", 1).unwrap();
        let b = fixture.node("AddINode", 2).unwrap();
        let list = fixture.node_list(&[a, b], 4).unwrap();
        let session = fixture.session();

        let list = NodeList::new(list).unwrap();
        assert_eq!(list.size(&session).unwrap(), 2);
        assert_eq!(list.as_array().max(&session).unwrap(), 4);

        let idx: Vec<u32> = list
            .nodes(&session)
            .unwrap()
            .iter()
            .map(|node| node.idx(&session).unwrap())
            .collect();
        assert_eq!(idx, vec![1, 2]);

        let array = list.as_array();
        assert_eq!(array.at(&session, 1).unwrap().unwrap().address(), b);
        assert!(array.at(&session, 3).unwrap().is_none());
        assert!(array.at(&session, 9).unwrap().is_none());
    }
}
