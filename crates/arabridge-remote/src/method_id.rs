//! Method ID catalog.
//!
//! Every remotely callable operation has a stable message id, agreed upon by both
//! processes through this catalog rather than derived from memory layout:
//!
//! - `1..FIRST_INTERFACE_METHOD_ID`: bootstrap operations ([`BootstrapCall`])
//! - `FIRST_INTERFACE_METHOD_ID..CUSTOM_MESSAGE_ID_BASE`: interface methods, encoded as
//!   `FIRST_INTERFACE_METHOD_ID + ((slot << INTERFACE_BITS) | interface)`
//! - everything else (except `0`, the reply id): application-defined custom messages

use arabridge_wire::MessageId;
use std::fmt;

/// Bits reserved for the interface index of a method id.
pub const INTERFACE_BITS: u32 = 4;

const INTERFACE_MASK: i32 = (1 << INTERFACE_BITS) - 1;

/// Method slots available per interface.
pub const MAX_INTERFACE_SLOTS: i32 = 64;

/// First id of the interface method range; everything below is bootstrap.
pub const FIRST_INTERFACE_METHOD_ID: i32 = 16;

/// First id available to application-defined custom messages.
pub const CUSTOM_MESSAGE_ID_BASE: i32 =
    FIRST_INTERFACE_METHOD_ID + (MAX_INTERFACE_SLOTS << INTERFACE_BITS);

/// Remote interfaces, numbered for method id derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Interface {
    AudioAccessController = 1,
    ArchivingController = 2,
    ContentAccessController = 3,
    ModelUpdateController = 4,
    PlaybackController = 5,
    DocumentController = 6,
    PlaybackRenderer = 7,
    EditorRenderer = 8,
    EditorView = 9,
}

impl Interface {
    pub const ALL: [Interface; 9] = [
        Interface::AudioAccessController,
        Interface::ArchivingController,
        Interface::ContentAccessController,
        Interface::ModelUpdateController,
        Interface::PlaybackController,
        Interface::DocumentController,
        Interface::PlaybackRenderer,
        Interface::EditorRenderer,
        Interface::EditorView,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|interface| *interface as i32 == index)
    }

    /// Whether the host implements this interface (the plug-in calls it).
    pub fn is_host_interface(self) -> bool {
        matches!(
            self,
            Interface::AudioAccessController
                | Interface::ArchivingController
                | Interface::ContentAccessController
                | Interface::ModelUpdateController
                | Interface::PlaybackController
        )
    }
}

/// Id of method `slot` of `interface`.
pub const fn method_id(interface: Interface, slot: i32) -> MessageId {
    assert!(slot >= 0 && slot < MAX_INTERFACE_SLOTS);
    MessageId::new(FIRST_INTERFACE_METHOD_ID + ((slot << INTERFACE_BITS) | interface as i32))
}

/// Id of application-defined custom message number `index`.
pub const fn custom_message_id(index: i32) -> MessageId {
    assert!(index >= 0);
    MessageId::new(CUSTOM_MESSAGE_ID_BASE + index)
}

/// Global operations that set up and tear down a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BootstrapCall {
    GetFactoriesCount = 1,
    GetFactory = 2,
    InitializeAra = 3,
    CreateDocumentControllerWithDocument = 4,
    BindToDocumentController = 5,
    CleanupBinding = 6,
    UninitializeAra = 7,
}

impl BootstrapCall {
    pub const ALL: [BootstrapCall; 7] = [
        BootstrapCall::GetFactoriesCount,
        BootstrapCall::GetFactory,
        BootstrapCall::InitializeAra,
        BootstrapCall::CreateDocumentControllerWithDocument,
        BootstrapCall::BindToDocumentController,
        BootstrapCall::CleanupBinding,
        BootstrapCall::UninitializeAra,
    ];

    pub const fn id(self) -> MessageId {
        MessageId::new(self as i32)
    }

    pub fn from_id(id: MessageId) -> Option<Self> {
        Self::ALL.into_iter().find(|call| call.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            BootstrapCall::GetFactoriesCount => "bootstrap::GET_FACTORIES_COUNT",
            BootstrapCall::GetFactory => "bootstrap::GET_FACTORY",
            BootstrapCall::InitializeAra => "bootstrap::INITIALIZE_ARA",
            BootstrapCall::CreateDocumentControllerWithDocument => {
                "bootstrap::CREATE_DOCUMENT_CONTROLLER_WITH_DOCUMENT"
            }
            BootstrapCall::BindToDocumentController => "bootstrap::BIND_TO_DOCUMENT_CONTROLLER",
            BootstrapCall::CleanupBinding => "bootstrap::CLEANUP_BINDING",
            BootstrapCall::UninitializeAra => "bootstrap::UNINITIALIZE_ARA",
        }
    }
}

/// What a message id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Reply,
    Bootstrap(BootstrapCall),
    Method { interface: Interface, slot: i32 },
    Custom,
    /// Inside a reserved range but not assigned.
    Unassigned,
}

pub fn classify(id: MessageId) -> MessageClass {
    let raw = id.get();
    if raw == 0 {
        return MessageClass::Reply;
    }
    if let Some(call) = BootstrapCall::from_id(id) {
        return MessageClass::Bootstrap(call);
    }
    if raw > 0 && raw < FIRST_INTERFACE_METHOD_ID {
        return MessageClass::Unassigned;
    }
    if (FIRST_INTERFACE_METHOD_ID..CUSTOM_MESSAGE_ID_BASE).contains(&raw) {
        let offset = raw - FIRST_INTERFACE_METHOD_ID;
        return match Interface::from_index(offset & INTERFACE_MASK) {
            Some(interface) => MessageClass::Method {
                interface,
                slot: offset >> INTERFACE_BITS,
            },
            None => MessageClass::Unassigned,
        };
    }
    MessageClass::Custom
}

macro_rules! method_catalog {
    ($( $module:ident => $interface:ident { $( $name:ident = $slot:expr ),* $(,)? } )*) => {
        $(
            pub mod $module {
                use super::{method_id, Interface};
                use arabridge_wire::MessageId;

                $( pub const $name: MessageId = method_id(Interface::$interface, $slot); )*
            }
        )*

        const CATALOG: &[(MessageId, &str)] = &[
            $( $( ($module::$name, concat!(stringify!($module), "::", stringify!($name))), )* )*
        ];
    };
}

method_catalog! {
    audio_access_controller => AudioAccessController {
        CREATE_AUDIO_READER_FOR_SOURCE = 0,
        READ_AUDIO_SAMPLES = 1,
        DESTROY_AUDIO_READER = 2,
    }
    archiving_controller => ArchivingController {
        GET_ARCHIVE_SIZE = 0,
        READ_BYTES_FROM_ARCHIVE = 1,
        WRITE_BYTES_TO_ARCHIVE = 2,
        NOTIFY_DOCUMENT_ARCHIVING_PROGRESS = 3,
        NOTIFY_DOCUMENT_UNARCHIVING_PROGRESS = 4,
        GET_DOCUMENT_ARCHIVE_ID = 5,
    }
    content_access_controller => ContentAccessController {
        IS_MUSICAL_CONTEXT_CONTENT_AVAILABLE = 0,
        GET_MUSICAL_CONTEXT_CONTENT_GRADE = 1,
        CREATE_MUSICAL_CONTEXT_CONTENT_READER = 2,
        IS_AUDIO_SOURCE_CONTENT_AVAILABLE = 3,
        GET_AUDIO_SOURCE_CONTENT_GRADE = 4,
        CREATE_AUDIO_SOURCE_CONTENT_READER = 5,
        GET_CONTENT_READER_EVENT_COUNT = 6,
        GET_CONTENT_READER_DATA_FOR_EVENT = 7,
        DESTROY_CONTENT_READER = 8,
    }
    model_update_controller => ModelUpdateController {
        NOTIFY_AUDIO_SOURCE_ANALYSIS_PROGRESS = 0,
        NOTIFY_AUDIO_SOURCE_CONTENT_CHANGED = 1,
        NOTIFY_AUDIO_MODIFICATION_CONTENT_CHANGED = 2,
        NOTIFY_PLAYBACK_REGION_CONTENT_CHANGED = 3,
    }
    playback_controller => PlaybackController {
        REQUEST_START_PLAYBACK = 0,
        REQUEST_STOP_PLAYBACK = 1,
        REQUEST_SET_PLAYBACK_POSITION = 2,
        REQUEST_SET_CYCLE_RANGE = 3,
        REQUEST_ENABLE_CYCLE = 4,
    }
    document_controller => DocumentController {
        DESTROY_DOCUMENT_CONTROLLER = 0,
        BEGIN_EDITING = 1,
        END_EDITING = 2,
        NOTIFY_MODEL_UPDATES = 3,
        RESTORE_OBJECTS_FROM_ARCHIVE = 4,
        STORE_OBJECTS_TO_ARCHIVE = 5,
        UPDATE_DOCUMENT_PROPERTIES = 6,
        CREATE_MUSICAL_CONTEXT = 7,
        UPDATE_MUSICAL_CONTEXT_PROPERTIES = 8,
        UPDATE_MUSICAL_CONTEXT_CONTENT = 9,
        DESTROY_MUSICAL_CONTEXT = 10,
        CREATE_AUDIO_SOURCE = 11,
        UPDATE_AUDIO_SOURCE_PROPERTIES = 12,
        ENABLE_AUDIO_SOURCE_SAMPLES_ACCESS = 13,
        DESTROY_AUDIO_SOURCE = 14,
        IS_AUDIO_SOURCE_CONTENT_AVAILABLE = 15,
        GET_AUDIO_SOURCE_CONTENT_GRADE = 16,
        CREATE_AUDIO_SOURCE_CONTENT_READER = 17,
        REQUEST_AUDIO_SOURCE_CONTENT_ANALYSIS = 18,
        GET_CONTENT_READER_EVENT_COUNT = 19,
        GET_CONTENT_READER_DATA_FOR_EVENT = 20,
        DESTROY_CONTENT_READER = 21,
    }
    playback_renderer => PlaybackRenderer {
        ADD_PLAYBACK_REGION = 0,
        REMOVE_PLAYBACK_REGION = 1,
    }
    editor_renderer => EditorRenderer {
        ADD_PLAYBACK_REGION = 0,
        REMOVE_PLAYBACK_REGION = 1,
        ADD_REGION_SEQUENCE = 2,
        REMOVE_REGION_SEQUENCE = 3,
    }
    editor_view => EditorView {
        NOTIFY_SELECTION = 0,
        NOTIFY_HIDE_REGION_SEQUENCES = 1,
    }
}

/// Catalog name of `id`, if it names a bootstrap operation or interface method.
pub fn method_name(id: MessageId) -> Option<&'static str> {
    if let Some(call) = BootstrapCall::from_id(id) {
        return Some(call.name());
    }
    CATALOG
        .iter()
        .find(|(catalog_id, _)| *catalog_id == id)
        .map(|(_, name)| *name)
}

/// Human-readable rendering of a message id, for logs.
pub struct Describe(pub MessageId);

impl fmt::Display for Describe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = method_name(self.0) {
            return f.write_str(name);
        }
        match classify(self.0) {
            MessageClass::Reply => f.write_str("reply"),
            MessageClass::Custom => write!(f, "custom({})", self.0.get()),
            MessageClass::Method { interface, slot } => write!(f, "{:?}[{}]", interface, slot),
            MessageClass::Bootstrap(_) | MessageClass::Unassigned => {
                write!(f, "unassigned({})", self.0.get())
            }
        }
    }
}
