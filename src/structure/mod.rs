/*!
 * Reference document structure handling.
 *
 * - `dom`: minimal owned XML tree with quick-xml parse/serialize
 * - `markup`: arena-of-runs model for a unit's inline formatting
 * - `extractor`: leaf-biased structural unit extraction with stable ids
 * - `writer`: structure-preserving grafting of translated text
 */

pub mod dom;
pub mod extractor;
pub mod markup;
pub mod writer;

pub use dom::{XmlChild, XmlDocument, XmlNode};
pub use extractor::{ReferenceDocument, StructuralUnit, StructureExtractor, UnitKind};
pub use markup::{MarkupTree, Run, RunId};
pub use writer::{StructureWriter, WriteOutcome};
