//! Conversion between the 54-sticker facelet layout and the cubie model.
//!
//! Facelets are listed face by face in U R F D L B order, nine per face,
//! row-major as seen when looking at that face with U or F on top. Each
//! sticker is named by the face its color belongs to, so the solved cube is
//! `UUUUUUUUURRRRRRRRRFFFFFFFFFDDDDDDDDDLLLLLLLLLBBBBBBBBB`.

use crate::{
    CubeError, InvalidCubeState,
    cubie::{CORNERS, CubieState, EDGES},
    moves::Face,
};

pub const FACELETS: usize = 54;

const fn facelet(face: Face, i: usize) -> usize {
    face as usize * 9 + i
}

/// Sticker positions of each corner slot, clockwise starting with the U or D
/// sticker.
const CORNER_FACELETS: [[usize; 3]; CORNERS] = {
    use Face::{B, D, F, L, R, U};
    [
        [facelet(U, 8), facelet(R, 0), facelet(F, 2)],
        [facelet(U, 6), facelet(F, 0), facelet(L, 2)],
        [facelet(U, 0), facelet(L, 0), facelet(B, 2)],
        [facelet(U, 2), facelet(B, 0), facelet(R, 2)],
        [facelet(D, 2), facelet(F, 8), facelet(R, 6)],
        [facelet(D, 0), facelet(L, 8), facelet(F, 6)],
        [facelet(D, 6), facelet(B, 8), facelet(L, 6)],
        [facelet(D, 8), facelet(R, 8), facelet(B, 6)],
    ]
};

const CORNER_COLORS: [[Face; 3]; CORNERS] = {
    use Face::{B, D, F, L, R, U};
    [
        [U, R, F],
        [U, F, L],
        [U, L, B],
        [U, B, R],
        [D, F, R],
        [D, L, F],
        [D, B, L],
        [D, R, B],
    ]
};

const EDGE_FACELETS: [[usize; 2]; EDGES] = {
    use Face::{B, D, F, L, R, U};
    [
        [facelet(U, 5), facelet(R, 1)],
        [facelet(U, 7), facelet(F, 1)],
        [facelet(U, 3), facelet(L, 1)],
        [facelet(U, 1), facelet(B, 1)],
        [facelet(D, 5), facelet(R, 7)],
        [facelet(D, 1), facelet(F, 7)],
        [facelet(D, 3), facelet(L, 7)],
        [facelet(D, 7), facelet(B, 7)],
        [facelet(F, 5), facelet(R, 3)],
        [facelet(F, 3), facelet(L, 5)],
        [facelet(B, 5), facelet(L, 3)],
        [facelet(B, 3), facelet(R, 5)],
    ]
};

const EDGE_COLORS: [[Face; 2]; EDGES] = {
    use Face::{B, D, F, L, R, U};
    [
        [U, R],
        [U, F],
        [U, L],
        [U, B],
        [D, R],
        [D, F],
        [D, L],
        [D, B],
        [F, R],
        [F, L],
        [B, L],
        [B, R],
    ]
};

/// Parses a 54 character facelet string.
///
/// # Errors
///
/// See [`from_face_array`]; additionally fails on a wrong length or an
/// unknown sticker letter.
pub fn from_facelets(facelets: &str) -> Result<CubieState, CubeError> {
    let count = facelets.chars().count();
    if count != FACELETS {
        return Err(CubeError::FaceletCount(count));
    }
    let mut faces = [Face::U; FACELETS];
    for (face, c) in faces.iter_mut().zip(facelets.chars()) {
        *face = Face::from_char(c).ok_or(CubeError::UnknownFacelet(c))?;
    }
    from_face_array(&faces)
}

/// Identifies the piece and orientation in every slot.
///
/// # Errors
///
/// Returns [`InvalidCubeState`] when a slot's stickers match no physical
/// piece, or when the pieces found do not form a reachable cube.
pub fn from_face_array(faces: &[Face; FACELETS]) -> Result<CubieState, CubeError> {
    if Face::ALL
        .iter()
        .any(|&face| faces[facelet(face, 4)] != face)
    {
        return Err(InvalidCubeState::CenterMismatch.into());
    }

    let mut state = CubieState::SOLVED;

    for (slot, positions) in CORNER_FACELETS.iter().enumerate() {
        // The twist is how far clockwise the U/D colored sticker sits from the
        // slot's U/D facelet.
        let twist = positions
            .iter()
            .position(|&p| matches!(faces[p], Face::U | Face::D))
            .ok_or(InvalidCubeState::NoMatchingCorner(slot))?;
        let clockwise = faces[positions[(twist + 1) % 3]];
        let anticlockwise = faces[positions[(twist + 2) % 3]];
        let piece = CORNER_COLORS
            .iter()
            .position(|colors| colors[1] == clockwise && colors[2] == anticlockwise)
            .ok_or(InvalidCubeState::NoMatchingCorner(slot))?;
        if CORNER_COLORS[piece][0] != faces[positions[twist]] {
            return Err(InvalidCubeState::NoMatchingCorner(slot).into());
        }
        state.cp[slot] = piece as u8;
        state.co[slot] = twist as u8;
    }

    for (slot, positions) in EDGE_FACELETS.iter().enumerate() {
        let stickers = [faces[positions[0]], faces[positions[1]]];
        let (piece, flip) = EDGE_COLORS
            .iter()
            .enumerate()
            .find_map(|(piece, colors)| {
                if *colors == stickers {
                    Some((piece, 0))
                } else if colors[0] == stickers[1] && colors[1] == stickers[0] {
                    Some((piece, 1))
                } else {
                    None
                }
            })
            .ok_or(InvalidCubeState::NoMatchingEdge(slot))?;
        state.ep[slot] = piece as u8;
        state.eo[slot] = flip;
    }

    state.verify()?;
    Ok(state)
}

#[must_use]
pub fn to_face_array(state: &CubieState) -> [Face; FACELETS] {
    let mut faces = [Face::U; FACELETS];
    for face in Face::ALL {
        faces[facelet(face, 4)] = face;
    }
    for (slot, positions) in CORNER_FACELETS.iter().enumerate() {
        let colors = CORNER_COLORS[usize::from(state.cp[slot])];
        let twist = usize::from(state.co[slot]);
        for (k, &color) in colors.iter().enumerate() {
            faces[positions[(k + twist) % 3]] = color;
        }
    }
    for (slot, positions) in EDGE_FACELETS.iter().enumerate() {
        let colors = EDGE_COLORS[usize::from(state.ep[slot])];
        let flip = usize::from(state.eo[slot]);
        for (k, &color) in colors.iter().enumerate() {
            faces[positions[(k + flip) % 2]] = color;
        }
    }
    faces
}

#[must_use]
pub fn to_facelets(state: &CubieState) -> String {
    to_face_array(state).iter().map(|face| face.to_char()).collect()
}
