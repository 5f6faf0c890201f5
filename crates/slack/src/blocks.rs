use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

/// Interactive element inside an `Input` block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        multiline: bool,
    },
    StaticSelect {
        action_id: String,
        options: Vec<SelectOption>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<SelectOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<ButtonElement>,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
    },
}

/// A modal view ready for `views.open`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub view_type: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(callback_id: impl Into<String>) -> Self {
        Self {
            view_type: "modal",
            callback_id: callback_id.into(),
            title: TextObject::plain("Configure"),
            submit: TextObject::plain("Submit"),
            close: TextObject::plain("Cancel"),
            blocks: Vec::new(),
        }
    }
}

/// A home tab view ready for `views.publish`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HomeTabView {
    #[serde(rename = "type")]
    pub view_type: &'static str,
    pub blocks: Vec<Block>,
}

pub const CONFIGURE_ACTION_ID: &str = "configure";

pub const ONBOARDING_MESSAGE: &str = "Please use the configure button to enter your OpenAI API \
key, choose a model, and optionally override the system prompt. You can create a key at \
<https://platform.openai.com/account/api-keys|platform.openai.com>.";

pub const READY_MESSAGE: &str = "This app is ready to use in this workspace :raised_hands:";

pub const DEFAULT_CONFIGURE_LABEL: &str = "Configure";

/// Home tab with the status copy and the configure entry point.
pub fn home_tab_view(message: &str, configure_label: &str) -> HomeTabView {
    HomeTabView {
        view_type: "home",
        blocks: vec![Block::Section {
            block_id: "home.status.v1".to_owned(),
            text: TextObject::mrkdwn(message),
            accessory: Some(
                ButtonElement::new(CONFIGURE_ACTION_ID, configure_label)
                    .style(ButtonStyle::Primary)
                    .value("api_key"),
            ),
        }],
    }
}
