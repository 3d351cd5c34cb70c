//! Reading primitive values, enumerands and function arguments.

use std::sync::Arc;

use super::TypeRegistry;
use crate::error::{TypeError, TypeResult};
use crate::model::{Enumerand, StaticDataMember, TypeNode, TypeNodeKind, UdtMember};
use crate::session::{DebuggerSession, SymTag};
use crate::types::{Address, TypeKey};
use crate::value::{apply_bitfield, coerce, BasicType, Bitfield, PrimitiveValue, ValueLocation};

impl<S: DebuggerSession> TypeRegistry<S>
{
    /// Read a primitive of type `type_node` from `location`.
    ///
    /// Typedefs are looked through. Enums read as their underlying base
    /// type, pointers as an unsigned integer of pointer width.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: the type is not primitive, or a byte buffer is
    ///   too short
    /// - `UnexpectedBasicType`: the base type has no primitive mapping
    /// - `MemoryRead`: propagated from the session
    pub fn read_primitive(
        &self,
        type_node: &Arc<TypeNode>,
        location: &ValueLocation,
        bitfield: Option<Bitfield>,
    ) -> TypeResult<PrimitiveValue>
    {
        let target = self.strip_typedefs(Arc::clone(type_node))?;
        let (basic_type, width) = self.primitive_shape(&target)?;
        let raw = self.read_location(location, width)?;
        let value = coerce(basic_type, width, &raw)?;
        match bitfield {
            Some(bitfield) => apply_bitfield(value, &raw, bitfield),
            None => Ok(value),
        }
    }

    fn primitive_shape(&self, node: &TypeNode) -> TypeResult<(BasicType, u64)>
    {
        match node.kind() {
            TypeNodeKind::Base(base) => Ok((base.basic_type, base.size)),
            TypeNodeKind::Pointer(pointer) => Ok((BasicType::UInt, pointer.size)),
            TypeNodeKind::Enum(enumeration) => {
                let underlying = self.strip_typedefs(self.node(enumeration.base_type)?)?;
                match underlying.kind() {
                    TypeNodeKind::Base(base) => Ok((base.basic_type, base.size)),
                    other => Err(TypeError::InvalidArgument(format!(
                        "enum {} has a {other} as its underlying type",
                        enumeration.name
                    ))),
                }
            }
            other => Err(TypeError::InvalidArgument(format!(
                "{} is a {other}, not a primitive type",
                self.name(node)?
            ))),
        }
    }

    fn read_location(&self, location: &ValueLocation, width: u64) -> TypeResult<Vec<u8>>
    {
        let len = usize::try_from(width)
            .map_err(|_| TypeError::InvalidArgument(format!("primitive width {width} does not fit in memory")))?;
        match location {
            ValueLocation::Memory(address) => {
                let mut buf = vec![0u8; len];
                self.session.read_memory(*address, &mut buf)?;
                Ok(buf)
            }
            ValueLocation::Register(register) => {
                let mut buf = vec![0u8; len];
                self.session.read_register(*register, &mut buf)?;
                Ok(buf)
            }
            ValueLocation::Bytes(bytes) => match bytes.get(..len) {
                Some(prefix) => Ok(prefix.to_vec()),
                None => Err(TypeError::InvalidArgument(format!(
                    "need {len} bytes, buffer holds {}",
                    bytes.len()
                ))),
            },
        }
    }

    /// Read the value of a data node.
    ///
    /// A `DataMember` is read at `object_address` plus its offset, narrowed
    /// to its bitfield if it has one. A `StaticDataMember` with a stored
    /// constant returns the constant without touching memory; otherwise it
    /// is read at its own address and `object_address` is ignored.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `node` is not a data node, if a data member is
    /// read without an object address, or if a static has no address.
    pub fn read_data_value(&self, node: &TypeNode, object_address: Option<Address>) -> TypeResult<PrimitiveValue>
    {
        match node.kind() {
            TypeNodeKind::DataMember(member) => {
                let base = object_address.ok_or_else(|| {
                    TypeError::InvalidArgument(format!("data member {} needs an object address", member.name))
                })?;
                let address = offset_address(base, member.offset)?;
                let member_type = self.node(member.member_type)?;
                self.read_primitive(&member_type, &ValueLocation::Memory(address), member.bitfield)
            }
            TypeNodeKind::StaticDataMember(member) => self.read_static(member),
            other => Err(TypeError::InvalidArgument(format!("{} is a {other}, not a data node", node.key()))),
        }
    }

    fn read_static(&self, member: &StaticDataMember) -> TypeResult<PrimitiveValue>
    {
        if let Some(value) = member.value {
            return Ok(value);
        }
        let address = member
            .address
            .ok_or_else(|| TypeError::InvalidArgument(format!("static {} has no address", member.name)))?;
        let member_type = self.node(member.member_type)?;
        self.read_primitive(&member_type, &ValueLocation::Memory(address), None)
    }

    /// Read a member of a UDT instance at `object_address`.
    ///
    /// Unlike [`TypeRegistry::read_data_value`] this honours the offset of
    /// members projected from base classes.
    pub fn read_member(&self, member: &UdtMember, object_address: Address) -> TypeResult<PrimitiveValue>
    {
        if let Some(value) = member.value {
            return Ok(value);
        }
        let member_type = self.node(member.member_type)?;
        let address = match member.address {
            Some(address) => address,
            None => offset_address(object_address, member.offset)?,
        };
        self.read_primitive(&member_type, &ValueLocation::Memory(address), member.bitfield)
    }

    /// Named values of an enum, in declaration order.
    pub fn enumerands(&self, node: &TypeNode) -> TypeResult<Arc<[Enumerand]>>
    {
        let TypeNodeKind::Enum(enumeration) = node.kind() else {
            return Err(TypeError::InvalidArgument(format!("{} is a {}, not an enum", node.key(), node.kind_name())));
        };
        node.cache
            .enumerands
            .get_or_try_init(|| {
                let key = node.key();
                let ids = self
                    .session
                    .children_ids(key.module, key.type_id, enumeration.child_count)?;
                let mut enumerands = Vec::with_capacity(ids.len());
                for id in ids {
                    let tag = self.session.sym_tag(key.module, id)?;
                    if tag != SymTag::Data {
                        self.diagnostics.unhandled_child(SymTag::Enum, tag, &enumeration.name);
                        continue;
                    }
                    let child = self.node(key.sibling(id))?;
                    match child.kind() {
                        TypeNodeKind::StaticDataMember(StaticDataMember {
                            name, value: Some(value), ..
                        }) => enumerands.push(Enumerand {
                            name: name.clone(),
                            value: *value,
                        }),
                        _ => {
                            self.diagnostics.unhandled_child(SymTag::Enum, tag, &enumeration.name);
                        }
                    }
                }
                Ok(Arc::from(enumerands))
            })
            .cloned()
    }

    /// Argument types of a function type, in order.
    pub fn function_arguments(&self, node: &TypeNode) -> TypeResult<Arc<[TypeKey]>>
    {
        let TypeNodeKind::FunctionType(function) = node.kind() else {
            return Err(TypeError::InvalidArgument(format!(
                "{} is a {}, not a function type",
                node.key(),
                node.kind_name()
            )));
        };
        node.cache
            .arguments
            .get_or_try_init(|| {
                let key = node.key();
                let ids = self.session.children_ids(key.module, key.type_id, function.arg_count)?;
                let mut arguments = Vec::with_capacity(ids.len());
                for id in ids {
                    let tag = self.session.sym_tag(key.module, id)?;
                    if tag != SymTag::FunctionArgType {
                        self.diagnostics.unhandled_child(SymTag::FunctionType, tag, "function type");
                        continue;
                    }
                    let child = self.node(key.sibling(id))?;
                    if let TypeNodeKind::FunctionArgType(argument) = child.kind() {
                        arguments.push(argument.arg_type);
                    }
                }
                Ok(Arc::from(arguments))
            })
            .cloned()
    }
}

fn offset_address(base: Address, offset: u64) -> TypeResult<Address>
{
    base.checked_add(offset)
        .ok_or_else(|| TypeError::InvalidArgument(format!("{base} + {offset:#x} overflows the address space")))
}
