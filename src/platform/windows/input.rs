use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};

use crate::input::{InputEvent, InputSink, MouseButton};

/// Delivers batches through one `SendInput` call each.
pub struct SendInputSink;

fn mouse(dx: i32, dy: i32, data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data as _,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn unicode_key(code_unit: u16, pressed: bool) -> INPUT {
    let flags = if pressed {
        KEYEVENTF_UNICODE
    } else {
        KEYBD_EVENT_FLAGS(KEYEVENTF_UNICODE.0 | KEYEVENTF_KEYUP.0)
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: code_unit,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn translate(event: &InputEvent) -> INPUT {
    match *event {
        InputEvent::MoveAbsolute { x, y } => {
            mouse(x, y, 0, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)
        }
        InputEvent::Button { button, pressed } => {
            let flags = match (button, pressed) {
                (MouseButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
                (MouseButton::Left, false) => MOUSEEVENTF_LEFTUP,
                (MouseButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
                (MouseButton::Right, false) => MOUSEEVENTF_RIGHTUP,
            };
            mouse(0, 0, 0, flags)
        }
        InputEvent::Wheel { delta } => mouse(0, 0, delta, MOUSEEVENTF_WHEEL),
        InputEvent::UnicodeKey { code_unit, pressed } => unicode_key(code_unit, pressed),
    }
}

impl InputSink for SendInputSink {
    fn send(&self, batch: &[InputEvent]) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let inputs: Vec<INPUT> = batch.iter().map(translate).collect();
        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if (sent as usize) < inputs.len() {
            tracing::warn!(
                requested = inputs.len(),
                sent,
                error = %windows::core::Error::from_win32(),
                "SendInput delivered a partial batch"
            );
        }
        sent as usize
    }
}
