use super::Engine;
use super::codec::ElementKind;
use super::store::ByteStore;
use super::view::TypedView;
use crate::error::{Error, Result};

/// Arguments handed to a [`ViewConstructor`].
#[derive(Clone, Debug)]
pub enum ConstructArgs {
    /// A fresh, zeroed view of this many elements
    Length(usize),
    /// A view over an existing store
    Buffer {
        store: ByteStore,
        byte_offset: usize,
        length: Option<usize>,
    },
}

/// What a constructor handed back.
#[derive(Clone, Debug)]
pub enum Object {
    View(TypedView),
    Buffer(ByteStore),
    Other(String),
}

impl Object {
    pub fn as_view(&self) -> Option<&TypedView> {
        match self {
            Object::View(v) => Some(v),
            _ => None,
        }
    }
}

pub trait ViewConstructor: Send + Sync {
    fn construct(&self, engine: &Engine, args: ConstructArgs) -> Result<Object>;
}

impl<F> ViewConstructor for F
where
    F: Fn(&Engine, ConstructArgs) -> Result<Object> + Send + Sync,
{
    fn construct(&self, engine: &Engine, args: ConstructArgs) -> Result<Object> {
        self(engine, args)
    }
}

pub trait BufferConstructor: Send + Sync {
    fn construct(&self, engine: &Engine, byte_length: usize) -> Result<Object>;
}

impl<F> BufferConstructor for F
where
    F: Fn(&Engine, usize) -> Result<Object> + Send + Sync,
{
    fn construct(&self, engine: &Engine, byte_length: usize) -> Result<Object> {
        self(engine, byte_length)
    }
}

/// The intrinsic constructor for one element kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultConstructor(pub ElementKind);

impl ViewConstructor for DefaultConstructor {
    fn construct(&self, engine: &Engine, args: ConstructArgs) -> Result<Object> {
        let view = match args {
            ConstructArgs::Length(n) => engine.create_view(self.0, n as u64)?,
            ConstructArgs::Buffer {
                store,
                byte_offset,
                length,
            } => engine.view_over(&store, self.0, byte_offset as u64, length.map(|l| l as u64))?,
        };
        Ok(Object::View(view))
    }
}

impl Engine {
    /// TypedArraySpeciesCreate: build a view through the receiver's species
    /// constructor and validate the result against the receiver.
    pub fn species_create(&self, exemplar: &TypedView, args: ConstructArgs) -> Result<TypedView> {
        let wanted = match &args {
            ConstructArgs::Length(n) => Some(*n),
            ConstructArgs::Buffer { .. } => None,
        };
        let view = match exemplar.species() {
            Some(ctor) => {
                log::trace!("species constructor for {}", exemplar.kind().name());
                self.allocate_derived(ctor.as_ref(), args)?
            }
            None => self.allocate_derived(&DefaultConstructor(exemplar.kind()), args)?,
        };
        if view.content_type() != exemplar.content_type() {
            return Err(Error::type_error(format!(
                "species constructor returned a {} for a {}",
                view.kind().name(),
                exemplar.kind().name()
            )));
        }
        if let Some(n) = wanted
            && view.length() < n
        {
            return Err(Error::range_error(format!(
                "species constructor returned {} elements, {} required",
                view.length(),
                n
            )));
        }
        Ok(view)
    }

    /// TypedArrayCreateSameType: intrinsic constructor of the exemplar's kind.
    pub fn create_same_type(&self, exemplar: &TypedView, length: usize) -> Result<TypedView> {
        self.allocate_derived(&DefaultConstructor(exemplar.kind()), ConstructArgs::Length(length))
    }

    /// Run a constructor and insist on an attached view.
    pub fn allocate_derived(&self, ctor: &dyn ViewConstructor, args: ConstructArgs) -> Result<TypedView> {
        match ctor.construct(self, args)? {
            Object::View(view) => {
                if view.is_detached() {
                    return Err(Error::detached());
                }
                Ok(view)
            }
            Object::Buffer(_) | Object::Other(_) => Err(Error::type_error(
                "species constructor did not return a typed array",
            )),
        }
    }
}
