//! # Field Accessors
//!
//! A `FieldAccessor<T>` describes one member of a struct-shaped type `T`:
//! which member it is, the column name and structural type it maps to, and
//! how to get and set it. Accessors are what the struct codecs iterate over;
//! each one builds the per-column writer and reader for its member.
//!
//! Two accessors are the same member (and share cached codecs) when their
//! [`FieldId`]s are equal: same owner type and same member name, or for the
//! synthesized members of a flags type, the same bit.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use eyre::{bail, Result};

use super::{flag_bits, Direction, Mapped, MappedFlags, TypeMapper};
use crate::codec::{column_writer, field_reader, CodecCompiler, ColumnWriter, FieldReader};
use crate::error::MappingError;
use crate::types::StructuralType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    /// A Rust struct member, by its declared identifier.
    Named(&'static str),
    /// A synthesized boolean for one bit of a flags type.
    FlagBit(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub owner: TypeId,
    pub member: Member,
}

pub(crate) trait FieldOps<T>: Send + Sync {
    fn check(&self, mapper: &mut TypeMapper, ty: &StructuralType, direction: Direction)
        -> Result<()>;

    fn build_writer(&self, compiler: &CodecCompiler) -> Result<ColumnWriter<T>>;

    fn build_reader(&self, compiler: &CodecCompiler, ty: &StructuralType)
        -> Result<FieldReader<T>>;

    /// Sets the member to its NULL value on every present row, if it has one.
    fn fill_null(&self, rows: &mut [Option<T>]);

    fn is_readonly(&self) -> bool;
}

pub struct FieldAccessor<T> {
    name: Arc<str>,
    id: FieldId,
    type_name: Arc<str>,
    nullable: bool,
    ty: StructuralType,
    bound: Option<StructuralType>,
    ops: Arc<dyn FieldOps<T>>,
}

impl<T: Mapped> FieldAccessor<T> {
    /// A readable and writable member. `member` is the Rust identifier,
    /// `column` the column name it maps to.
    pub fn member<F, G, S>(
        mapper: &mut TypeMapper,
        member: &'static str,
        column: &str,
        get: G,
        set: S,
    ) -> Result<Self>
    where
        F: Mapped,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        let ops = MemberOps::<T, F, G, S> {
            member,
            get: Arc::new(get),
            set: Some(Arc::new(set)),
            _marker: PhantomData,
        };
        Self::for_member::<F>(mapper, member, column, Arc::new(ops))
    }

    /// A member that can be written but not read back into `T`. Building a
    /// reader that needs it fails with `UnsupportedConstruct`.
    pub fn readonly<F, G>(
        mapper: &mut TypeMapper,
        member: &'static str,
        column: &str,
        get: G,
    ) -> Result<Self>
    where
        F: Mapped,
        G: Fn(&T) -> &F + Send + Sync + 'static,
    {
        let ops = MemberOps::<T, F, G, fn(&mut T, F)> {
            member,
            get: Arc::new(get),
            set: None,
            _marker: PhantomData,
        };
        Self::for_member::<F>(mapper, member, column, Arc::new(ops))
    }

    fn for_member<F: Mapped>(
        mapper: &mut TypeMapper,
        member: &'static str,
        column: &str,
        ops: Arc<dyn FieldOps<T>>,
    ) -> Result<Self> {
        Ok(Self {
            name: column.into(),
            id: FieldId {
                owner: TypeId::of::<T>(),
                member: Member::Named(member),
            },
            type_name: F::type_name().into(),
            nullable: F::NULLABLE,
            ty: mapper.structural_type::<F>()?,
            bound: None,
            ops,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Name of the member's declared type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Structural type implied by the member's declared type.
    pub fn structural_type(&self) -> &StructuralType {
        &self.ty
    }

    /// Structural type of the column this accessor was matched against.
    pub fn bound_type(&self) -> Option<&StructuralType> {
        self.bound.as_ref()
    }

    pub fn is_readonly(&self) -> bool {
        self.ops.is_readonly()
    }

    pub fn bound_to(&self, ty: StructuralType) -> Self {
        Self {
            bound: Some(ty),
            ..self.clone()
        }
    }

    pub(crate) fn check(
        &self,
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        self.ops.check(mapper, ty, direction)
    }

    pub(crate) fn build_writer(&self, compiler: &CodecCompiler) -> Result<ColumnWriter<T>> {
        self.ops.build_writer(compiler)
    }

    pub(crate) fn build_reader(
        &self,
        compiler: &CodecCompiler,
        ty: &StructuralType,
    ) -> Result<FieldReader<T>> {
        self.ops.build_reader(compiler, ty)
    }

    pub(crate) fn fill_null(&self, rows: &mut [Option<T>]) {
        self.ops.fill_null(rows)
    }
}

impl<T: Mapped + MappedFlags> FieldAccessor<T> {
    /// The synthesized boolean member for flag `bit` (a single set bit).
    pub(crate) fn flag_bit(name: &str, bit: u64) -> Self {
        Self {
            name: name.into(),
            id: FieldId {
                owner: TypeId::of::<T>(),
                member: Member::FlagBit(bit.trailing_zeros()),
            },
            type_name: "bool".into(),
            nullable: false,
            ty: StructuralType::primitive(crate::types::PrimitiveKind::Boolean),
            bound: None,
            ops: Arc::new(FlagBitOps::<T> {
                bit,
                _marker: PhantomData,
            }),
        }
    }
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            id: self.id,
            type_name: Arc::clone(&self.type_name),
            nullable: self.nullable,
            ty: self.ty.clone(),
            bound: self.bound.clone(),
            ops: Arc::clone(&self.ops),
        }
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("member", &self.id.member)
            .field("type_name", &self.type_name)
            .field("ty", &self.ty)
            .field("nullable", &self.nullable)
            .finish()
    }
}

struct MemberOps<T, F, G, S> {
    member: &'static str,
    get: Arc<G>,
    set: Option<Arc<S>>,
    _marker: PhantomData<fn(T) -> F>,
}

impl<T, F, G, S> FieldOps<T> for MemberOps<T, F, G, S>
where
    T: Mapped,
    F: Mapped,
    G: Fn(&T) -> &F + Send + Sync + 'static,
    S: Fn(&mut T, F) + Send + Sync + 'static,
{
    fn check(
        &self,
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        direction: Direction,
    ) -> Result<()> {
        F::check_compatible(mapper, ty, direction)
    }

    fn build_writer(&self, compiler: &CodecCompiler) -> Result<ColumnWriter<T>> {
        let inner = compiler.writer::<F>()?;
        let get = Arc::clone(&self.get);
        Ok(column_writer(move |rows: &[Option<&T>], vector, arena| {
            let values: Vec<Option<&F>> = rows.iter().map(|row| row.map(|v| (*get)(v))).collect();
            inner(&values, vector, arena)
        }))
    }

    fn build_reader(
        &self,
        compiler: &CodecCompiler,
        ty: &StructuralType,
    ) -> Result<FieldReader<T>> {
        let Some(set) = self.set.clone() else {
            bail!(MappingError::unsupported(
                T::type_name(),
                format!("member '{}' is read-only", self.member)
            ));
        };
        let inner = compiler.reader::<F>(ty)?;
        let type_name = F::type_name();

        Ok(field_reader(move |vector, rows: &mut [Option<T>], filter| {
            let values = inner(vector, rows.len(), filter)?;
            for (row, (target, value)) in rows.iter_mut().zip(values).enumerate() {
                let Some(target) = target.as_mut() else {
                    continue;
                };
                match value.or_else(F::null) {
                    Some(value) => (*set)(target, value),
                    None => bail!(MappingError::UnexpectedNull {
                        type_name: type_name.clone(),
                        row,
                    }),
                }
            }
            Ok(())
        }))
    }

    fn fill_null(&self, rows: &mut [Option<T>]) {
        let (Some(set), Some(null)) = (self.set.as_ref(), F::null()) else {
            return;
        };
        for target in rows.iter_mut().flatten() {
            (**set)(target, null.clone());
        }
    }

    fn is_readonly(&self) -> bool {
        self.set.is_none()
    }
}

struct FlagBitOps<T> {
    bit: u64,
    _marker: PhantomData<fn(T)>,
}

impl<T: Mapped + MappedFlags> FieldOps<T> for FlagBitOps<T> {
    fn check(
        &self,
        mapper: &mut TypeMapper,
        ty: &StructuralType,
        _direction: Direction,
    ) -> Result<()> {
        mapper.check_exact::<bool>(ty)
    }

    /// Bits no member declares have no column; a value carrying one is
    /// rejected rather than stored without it.
    fn build_writer(&self, compiler: &CodecCompiler) -> Result<ColumnWriter<T>> {
        let inner = compiler.writer::<bool>()?;
        let bit = self.bit;
        let declared = flag_bits::<T>().iter().fold(0, |mask, (_, member)| mask | member);
        Ok(column_writer(move |rows: &[Option<&T>], vector, arena| {
            if let Some(flags) = rows.iter().flatten().find(|flags| flags.bits() & !declared != 0) {
                bail!(MappingError::EnumOutOfRange {
                    type_name: T::type_name(),
                    value: flags.bits() as i64,
                    max_ordinal: declared as i64,
                });
            }
            let values: Vec<Option<bool>> = rows
                .iter()
                .map(|row| row.map(|flags| flags.bits() & bit != 0))
                .collect();
            let refs: Vec<Option<&bool>> = values.iter().map(Option::as_ref).collect();
            inner(&refs, vector, arena)
        }))
    }

    fn build_reader(
        &self,
        compiler: &CodecCompiler,
        ty: &StructuralType,
    ) -> Result<FieldReader<T>> {
        let inner = compiler.reader::<bool>(ty)?;
        let bit = self.bit;
        Ok(field_reader(move |vector, rows: &mut [Option<T>], filter| {
            let values = inner(vector, rows.len(), filter)?;
            for (row, (target, value)) in rows.iter_mut().zip(values).enumerate() {
                let Some(target) = target.as_mut() else {
                    continue;
                };
                let bits = match value {
                    Some(true) => target.bits() | bit,
                    Some(false) => target.bits() & !bit,
                    None => bail!(MappingError::UnexpectedNull {
                        type_name: "bool".into(),
                        row,
                    }),
                };
                *target = T::from_bits(bits);
            }
            Ok(())
        }))
    }

    fn fill_null(&self, _rows: &mut [Option<T>]) {}

    fn is_readonly(&self) -> bool {
        false
    }
}
