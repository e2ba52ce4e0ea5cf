use std::collections::VecDeque;
use std::ffi::c_void;
use std::ptr;

use anyhow::{anyhow, Context};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, BOOL, COLORREF, ERROR_CLASS_ALREADY_EXISTS, HINSTANCE, HWND, LPARAM, LRESULT,
    RECT, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    CreateSolidBrush, DeleteObject, FillRect, GetStockObject, DEFAULT_GUI_FONT, HBRUSH, HDC,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetWindowLongPtrW, GetWindowTextLengthW, GetWindowTextW, LoadCursorW, MoveWindow,
    PeekMessageW, RegisterClassW, SendMessageW, SetLayeredWindowAttributes, SetWindowLongPtrW,
    SetWindowPos, SetWindowTextW, ShowWindow, TranslateMessage, CS_HREDRAW, CS_VREDRAW,
    GWLP_USERDATA, HMENU, HWND_TOPMOST, IDC_ARROW, LWA_ALPHA, MSG, PM_REMOVE, SWP_NOACTIVATE,
    SWP_NOMOVE, SWP_NOSIZE, SWP_SHOWWINDOW, SW_SHOWNOACTIVATE, WINDOW_EX_STYLE, WINDOW_STYLE,
    WM_CLOSE, WM_COMMAND, WM_ERASEBKGND, WM_MOUSEWHEEL, WM_SETFONT, WM_SIZE, WNDCLASSW,
    WS_CAPTION, WS_CHILD, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_MINIMIZEBOX, WS_OVERLAPPED, WS_POPUP, WS_SYSMENU, WS_THICKFRAME, WS_VISIBLE, WS_VSCROLL,
};

use crate::overlay::{NativeSurface, Rect, SurfaceEvent, SurfaceFactory, SurfaceKind, SurfaceSpec};
use crate::overlay::TextZoom;

const CLASS_NAME: PCWSTR = w!("FranzOverlaySurface");

// Rich edit messages and edit styles live outside the enabled feature set.
const EM_SETREADONLY: u32 = 0x00CF;
const EM_SETBKGNDCOLOR: u32 = 0x0443;
const EM_SETTARGETDEVICE: u32 = 0x0449;
const EM_SETZOOM: u32 = 0x04E1;
const ES_MULTILINE: u32 = 0x0004;
const ES_AUTOVSCROLL: u32 = 0x0040;
const ES_READONLY: u32 = 0x0800;
const MK_CONTROL: usize = 0x0008;

/// Per-window state reachable from the window procedure. Owned by the
/// `Win32Surface` that created the window, not by any global table.
struct WindowState {
    events: VecDeque<SurfaceEvent>,
    background: HBRUSH,
}

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe extern "system" fn surface_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let state = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *mut WindowState;
    let Some(state) = (unsafe { state.as_mut() }) else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };

    match msg {
        WM_CLOSE => {
            // Teardown happens on the surface loop, not here.
            state.events.push_back(SurfaceEvent::Close);
            LRESULT(0)
        }
        WM_SIZE => {
            let width = (lparam.0 & 0xffff) as i32;
            let height = ((lparam.0 >> 16) & 0xffff) as i32;
            state.events.push_back(SurfaceEvent::Resize { width, height });
            LRESULT(0)
        }
        WM_COMMAND => {
            if lparam.0 != 0 {
                state
                    .events
                    .push_back(SurfaceEvent::Command((wparam.0 & 0xffff) as u16));
            }
            LRESULT(0)
        }
        WM_ERASEBKGND => {
            let hdc = HDC(wparam.0 as *mut c_void);
            let mut rc = RECT::default();
            unsafe {
                if GetClientRect(hwnd, &mut rc).is_ok() {
                    FillRect(hdc, &rc, state.background);
                }
            }
            LRESULT(1)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn register_class(hinstance: HINSTANCE) -> anyhow::Result<()> {
    unsafe {
        let wc = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(surface_wndproc),
            hInstance: hinstance,
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        if RegisterClassW(&wc) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
            return Err(anyhow!(
                "RegisterClassW failed: {}",
                windows::core::Error::from_win32()
            ));
        }
    }
    Ok(())
}

pub struct Win32SurfaceFactory;

impl SurfaceFactory for Win32SurfaceFactory {
    fn create(&self, spec: &SurfaceSpec) -> anyhow::Result<Box<dyn NativeSurface>> {
        unsafe {
            let hmodule = GetModuleHandleW(PCWSTR::null()).context("GetModuleHandleW")?;
            register_class(hmodule.into())?;

            let (ex_style, style) = match spec.kind {
                SurfaceKind::Hud => (
                    WS_EX_TOPMOST | WS_EX_LAYERED,
                    WS_OVERLAPPED | WS_CAPTION | WS_SYSMENU | WS_THICKFRAME | WS_MINIMIZEBOX,
                ),
                SurfaceKind::Marker => (
                    WS_EX_TOPMOST | WS_EX_LAYERED | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                    WS_POPUP,
                ),
            };
            let title = wide(&spec.title);
            let bounds = spec.bounds;
            let hwnd = CreateWindowExW(
                ex_style,
                CLASS_NAME,
                PCWSTR(title.as_ptr()),
                style,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                None,
                None,
                hmodule,
                None,
            )
            .context("CreateWindowExW for overlay")?;

            let colorref = COLORREF(spec.tint.to_colorref());
            let brush = CreateSolidBrush(colorref);
            let state = Box::into_raw(Box::new(WindowState {
                events: VecDeque::new(),
                background: brush,
            }));
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, state as isize);

            // From here on, dropping `surface` releases everything created so far.
            let mut surface = Win32Surface {
                hwnd,
                edit: None,
                button: None,
                state,
                brush,
                zoom: spec.zoom,
            };

            let alpha = (u32::from(spec.opacity.min(100)) * 255 / 100) as u8;
            SetLayeredWindowAttributes(hwnd, COLORREF(0), alpha, LWA_ALPHA)
                .context("SetLayeredWindowAttributes")?;

            let mut edit_style = WS_CHILD | WS_VISIBLE | WINDOW_STYLE(ES_MULTILINE | ES_AUTOVSCROLL);
            if spec.kind == SurfaceKind::Hud {
                edit_style |= WS_VSCROLL;
            }
            if spec.readonly {
                edit_style |= WINDOW_STYLE(ES_READONLY);
            }
            let edit = CreateWindowExW(
                WINDOW_EX_STYLE(0),
                w!("RICHEDIT50W"),
                PCWSTR::null(),
                edit_style,
                5,
                5,
                (bounds.width - 10).max(10),
                (bounds.height - 10).max(10),
                hwnd,
                None,
                hmodule,
                None,
            )
            .context("create rich edit child")?;
            surface.edit = Some(edit);

            let font = GetStockObject(DEFAULT_GUI_FONT);
            SendMessageW(edit, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
            SendMessageW(
                edit,
                EM_SETBKGNDCOLOR,
                WPARAM(0),
                LPARAM(colorref.0 as isize),
            );
            surface.set_text(&spec.text);

            if let Some(toggle) = &spec.toggle {
                let label = wide(&toggle.label);
                let button = CreateWindowExW(
                    WINDOW_EX_STYLE(0),
                    w!("BUTTON"),
                    PCWSTR(label.as_ptr()),
                    WS_CHILD | WS_VISIBLE,
                    0,
                    0,
                    10,
                    10,
                    hwnd,
                    HMENU(usize::from(toggle.id) as *mut c_void),
                    hmodule,
                    None,
                )
                .context("create toggle button")?;
                SendMessageW(button, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
                surface.button = Some(button);
            }

            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            let _ = SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_SHOWWINDOW,
            );
            Ok(Box::new(surface))
        }
    }
}

struct Win32Surface {
    hwnd: HWND,
    edit: Option<HWND>,
    button: Option<HWND>,
    state: *mut WindowState,
    brush: HBRUSH,
    zoom: TextZoom,
}

impl Win32Surface {
    fn apply_zoom(&self) {
        if let Some(edit) = self.edit {
            unsafe {
                SendMessageW(
                    edit,
                    EM_SETZOOM,
                    WPARAM(self.zoom.numerator() as usize),
                    LPARAM(self.zoom.denominator() as isize),
                );
            }
        }
    }
}

impl NativeSurface for Win32Surface {
    fn set_text(&mut self, text: &str) {
        let Some(edit) = self.edit else {
            return;
        };
        let text = wide(&text.replace("\r\n", "\n").replace('\n', "\r\n"));
        unsafe {
            let _ = SetWindowTextW(edit, PCWSTR(text.as_ptr()));
        }
        // Rich edit resets its zoom when the content is replaced.
        self.apply_zoom();
    }

    fn text(&self) -> String {
        let Some(edit) = self.edit else {
            return String::new();
        };
        unsafe {
            let len = GetWindowTextLengthW(edit);
            if len <= 0 {
                return String::new();
            }
            let mut buf = vec![0u16; len as usize + 1];
            let read = GetWindowTextW(edit, &mut buf).max(0) as usize;
            String::from_utf16_lossy(&buf[..read.min(buf.len())])
                .replace("\r\n", "\n")
                .replace('\r', "\n")
        }
    }

    fn set_readonly(&mut self, readonly: bool) {
        if let Some(edit) = self.edit {
            unsafe {
                SendMessageW(edit, EM_SETREADONLY, WPARAM(usize::from(readonly)), LPARAM(0));
            }
        }
    }

    fn set_toggle_label(&mut self, label: &str) {
        if let Some(button) = self.button {
            let label = wide(label);
            unsafe {
                let _ = SetWindowTextW(button, PCWSTR(label.as_ptr()));
            }
        }
    }

    fn zoom(&self) -> TextZoom {
        self.zoom
    }

    fn set_zoom(&mut self, zoom: TextZoom) {
        self.zoom = zoom;
        self.apply_zoom();
    }

    fn client_size(&self) -> (i32, i32) {
        let mut rc = RECT::default();
        unsafe {
            if GetClientRect(self.hwnd, &mut rc).is_err() {
                return (0, 0);
            }
        }
        (rc.right - rc.left, rc.bottom - rc.top)
    }

    fn place_children(&mut self, text: Rect, toggle: Option<Rect>) {
        unsafe {
            if let Some(edit) = self.edit {
                let _ = MoveWindow(edit, text.x, text.y, text.width, text.height, BOOL(1));
                // Wrap to the window width.
                SendMessageW(edit, EM_SETTARGETDEVICE, WPARAM(0), LPARAM(0));
            }
            if let (Some(button), Some(rect)) = (self.button, toggle) {
                let _ = MoveWindow(button, rect.x, rect.y, rect.width, rect.height, BOOL(1));
            }
        }
    }

    fn pump_events(&mut self) -> Vec<SurfaceEvent> {
        let mut extra = Vec::new();
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                // Modifier+wheel is claimed before the rich edit can zoom on
                // its own, so the surface keeps a single zoom value.
                if msg.message == WM_MOUSEWHEEL && (msg.wParam.0 & MK_CONTROL) != 0 {
                    let delta = ((msg.wParam.0 >> 16) & 0xffff) as u16 as i16 as i32;
                    extra.push(SurfaceEvent::Wheel {
                        delta,
                        modifier: true,
                    });
                    continue;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        let mut events: Vec<SurfaceEvent> = unsafe { self.state.as_mut() }
            .map(|state| state.events.drain(..).collect())
            .unwrap_or_default();
        events.extend(extra);
        events
    }

    fn destroy(&mut self) {
        unsafe {
            if !self.hwnd.0.is_null() {
                SetWindowLongPtrW(self.hwnd, GWLP_USERDATA, 0);
                let _ = DestroyWindow(self.hwnd);
                self.hwnd = HWND::default();
                self.edit = None;
                self.button = None;
            }
            if !self.state.is_null() {
                drop(Box::from_raw(self.state));
                self.state = ptr::null_mut();
            }
            if !self.brush.0.is_null() {
                let _ = DeleteObject(self.brush);
                self.brush = HBRUSH::default();
            }
        }
    }
}

impl Drop for Win32Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}
